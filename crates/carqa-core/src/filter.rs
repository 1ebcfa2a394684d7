//! Typed metadata predicate applied to candidate pools before fusion.

use serde::{Deserialize, Serialize};

use crate::types::{DocumentChunk, ReviewType};

/// Conjunctive filter over the fixed chunk metadata schema.
///
/// Every populated field must match for a chunk to pass. String fields
/// compare case-insensitively. A chunk without a year fails any year
/// bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub review_type: Option<ReviewType>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub year_min: Option<i32>,
    #[serde(default)]
    pub year_max: Option<i32>,
}

impl MetadataFilter {
    pub fn review_type(review_type: ReviewType) -> Self {
        Self { review_type: Some(review_type), ..Self::default() }
    }

    pub fn vehicle(make: impl Into<String>, model: impl Into<String>) -> Self {
        Self { make: Some(make.into()), model: Some(model.into()), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.review_type.is_none()
            && self.make.is_none()
            && self.model.is_none()
            && self.body_type.is_none()
            && self.year_min.is_none()
            && self.year_max.is_none()
    }

    pub fn matches(&self, chunk: &DocumentChunk) -> bool {
        if let Some(rt) = self.review_type {
            if chunk.review_type != rt {
                return false;
            }
        }
        if let Some(make) = &self.make {
            if !eq_fold(&chunk.vehicle.make, make) {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if !eq_fold(&chunk.vehicle.model, model) {
                return false;
            }
        }
        if let Some(body) = &self.body_type {
            match &chunk.vehicle.body_type {
                Some(b) if eq_fold(b, body) => {}
                _ => return false,
            }
        }
        if self.year_min.is_some() || self.year_max.is_some() {
            let Some(year) = chunk.vehicle.year else {
                return false;
            };
            if self.year_min.is_some_and(|min| year < min) {
                return false;
            }
            if self.year_max.is_some_and(|max| year > max) {
                return false;
            }
        }
        true
    }
}

/// Unicode case-insensitive equality, so makes like "Škoda" or
/// "Citroën" match regardless of how the caller cased them.
fn eq_fold(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VehicleMeta;

    fn chunk(review_type: ReviewType, make: &str, model: &str, year: Option<i32>) -> DocumentChunk {
        DocumentChunk {
            id: "c:0".to_string(),
            doc_id: "doc".to_string(),
            content: "text".to_string(),
            review_type,
            vehicle: VehicleMeta {
                make: make.to_string(),
                model: model.to_string(),
                body_type: Some("sedan".to_string()),
                year,
            },
            chunk_index: 0,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = MetadataFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&chunk(ReviewType::Expert, "BMW", "M5", Some(2019))));
    }

    #[test]
    fn review_type_filter_excludes_other_kind() {
        let f = MetadataFilter::review_type(ReviewType::LongTerm);
        assert!(f.matches(&chunk(ReviewType::LongTerm, "BMW", "M5", None)));
        assert!(!f.matches(&chunk(ReviewType::Expert, "BMW", "M5", None)));
    }

    #[test]
    fn make_and_model_compare_case_insensitively() {
        let f = MetadataFilter::vehicle("bmw", "m5");
        assert!(f.matches(&chunk(ReviewType::Expert, "BMW", "M5", None)));
        assert!(!f.matches(&chunk(ReviewType::Expert, "Tesla", "Model S", None)));
    }

    #[test]
    fn non_ascii_makes_compare_case_insensitively() {
        let f = MetadataFilter::vehicle("škoda", "OCTAVIA");
        assert!(f.matches(&chunk(ReviewType::Expert, "Škoda", "Octavia", None)));
        assert!(!f.matches(&chunk(ReviewType::Expert, "Skoda", "Octavia", None)));
    }

    #[test]
    fn year_bounds_are_inclusive_and_require_a_year() {
        let f = MetadataFilter { year_min: Some(2018), year_max: Some(2020), ..MetadataFilter::default() };
        assert!(f.matches(&chunk(ReviewType::Expert, "BMW", "M5", Some(2018))));
        assert!(f.matches(&chunk(ReviewType::Expert, "BMW", "M5", Some(2020))));
        assert!(!f.matches(&chunk(ReviewType::Expert, "BMW", "M5", Some(2021))));
        assert!(!f.matches(&chunk(ReviewType::Expert, "BMW", "M5", None)));
    }
}
