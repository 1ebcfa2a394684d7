use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::types::{ChunkId, DocumentChunk};

use crate::tokenize::tokenize;

/// BM25 tuning constants. `k1` controls term-frequency saturation, `b`
/// the strength of document-length normalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    doc: u32,
    tf: u32,
}

/// Inverted index with per-term postings and corpus statistics.
///
/// Owned exclusively by the sparse engine; rebuilt wholesale on
/// ingestion and never mutated mid-query. `BTreeMap` keeps term
/// iteration order stable so scoring is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseIndex {
    params: Bm25Params,
    postings: BTreeMap<String, Vec<Posting>>,
    ids: Vec<ChunkId>,
    doc_len: Vec<u32>,
    avg_len: f32,
}

impl SparseIndex {
    /// Tokenize every chunk and accumulate term/document statistics.
    pub fn build(chunks: &[DocumentChunk], params: Bm25Params) -> Result<Self> {
        carqa_core::types::validate_chunks(chunks)?;

        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut doc_len = Vec::with_capacity(chunks.len());

        for (ordinal, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.content);
            let mut tf: BTreeMap<&str, u32> = BTreeMap::new();
            for token in &tokens {
                *tf.entry(token.as_str()).or_default() += 1;
            }
            for (term, count) in tf {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push(Posting { doc: ordinal as u32, tf: count });
            }
            ids.push(chunk.id.clone());
            doc_len.push(tokens.len() as u32);
        }

        let total: u64 = doc_len.iter().map(|&l| u64::from(l)).sum();
        let avg_len = if doc_len.is_empty() {
            0.0
        } else {
            total as f32 / doc_len.len() as f32
        };

        tracing::debug!(
            chunks = ids.len(),
            terms = postings.len(),
            avg_len,
            "built sparse index"
        );
        Ok(Self { params, postings, ids, doc_len, avg_len })
    }

    /// Index over no chunks. Searching it is a query error, same as
    /// any other empty index.
    pub fn empty(params: Bm25Params) -> Self {
        Self {
            params,
            postings: BTreeMap::new(),
            ids: Vec::new(),
            doc_len: Vec::new(),
            avg_len: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Top-`n` chunks by BM25, min-max normalized to [0,1] per query.
    pub fn search(&self, query: &str, n: usize) -> Result<Vec<(ChunkId, f32)>> {
        self.search_filtered(query, n, None)
    }

    /// Like `search`, but chunks outside `allowed` are excluded before
    /// scoring and normalization, so a filtered-out chunk never consumes
    /// a candidate slot.
    pub fn search_filtered(
        &self,
        query: &str,
        n: usize,
        allowed: Option<&HashSet<ChunkId>>,
    ) -> Result<Vec<(ChunkId, f32)>> {
        if self.is_empty() {
            return Err(Error::Query("sparse index is empty".to_string()));
        }
        if n == 0 {
            return Err(Error::Query("requested result count must be positive".to_string()));
        }

        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let corpus = self.ids.len() as f32;
        let mut scores: BTreeMap<u32, f32> = BTreeMap::new();
        // Duplicate query terms contribute once, as in classic BM25.
        let mut seen: HashSet<&str> = HashSet::new();
        for term in &terms {
            if !seen.insert(term.as_str()) {
                continue;
            }
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((corpus - df + 0.5) / (df + 0.5) + 1.0).ln();
            for posting in postings {
                let ordinal = posting.doc as usize;
                if let Some(allowed) = allowed {
                    if !allowed.contains(&self.ids[ordinal]) {
                        continue;
                    }
                }
                let tf = posting.tf as f32;
                let len_norm = 1.0 - self.params.b
                    + self.params.b * self.doc_len[ordinal] as f32 / self.avg_len;
                let saturated = tf * (self.params.k1 + 1.0) / (tf + self.params.k1 * len_norm);
                *scores.entry(posting.doc).or_default() += idf * saturated;
            }
        }

        let mut hits: Vec<(ChunkId, f32)> = scores
            .into_iter()
            .map(|(doc, score)| (self.ids[doc as usize].clone(), score))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(n);
        normalize_min_max(&mut hits);
        Ok(hits)
    }
}

/// Min-max normalize scores in place. All-equal scores (including a
/// single hit) normalize to 1.0.
fn normalize_min_max(hits: &mut [(ChunkId, f32)]) {
    let Some(max) = hits.first().map(|h| h.1) else {
        return;
    };
    let min = hits.last().map_or(max, |h| h.1);
    let range = max - min;
    for hit in hits.iter_mut() {
        hit.1 = if range > f32::EPSILON { (hit.1 - min) / range } else { 1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carqa_core::types::{ReviewType, VehicleMeta};

    fn chunk(id: &str, content: &str) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            doc_id: id.split(':').next().unwrap_or(id).to_string(),
            content: content.to_string(),
            review_type: ReviewType::Expert,
            vehicle: VehicleMeta {
                make: "BMW".to_string(),
                model: "M5".to_string(),
                body_type: None,
                year: None,
            },
            chunk_index: 0,
        }
    }

    fn corpus() -> Vec<DocumentChunk> {
        vec![
            chunk("a:0", "BMW M5 reliability is excellent"),
            chunk("b:0", "After 3 years the M5 needed minor repairs"),
            chunk("c:0", "Tesla Model S comfort review"),
        ]
    }

    #[test]
    fn lexical_match_ranks_first() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        let hits = index.search("BMW M5 reliability", 3).expect("search");
        assert_eq!(hits[0].0, "a:0");
        assert!((hits[0].1 - 1.0).abs() < 1e-6, "top hit normalizes to 1.0");
    }

    #[test]
    fn scores_are_normalized_per_query() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        let hits = index.search("M5 reliability repairs", 3).expect("search");
        assert!(hits.len() >= 2);
        for (_, score) in &hits {
            assert!((0.0..=1.0).contains(score));
        }
    }

    #[test]
    fn empty_index_is_a_query_error() {
        let index = SparseIndex::build(&[], Bm25Params::default()).expect("build");
        assert!(matches!(index.search("anything", 5), Err(Error::Query(_))));
    }

    #[test]
    fn zero_n_is_a_query_error() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        assert!(matches!(index.search("bmw", 0), Err(Error::Query(_))));
    }

    #[test]
    fn stop_word_only_query_returns_no_hits() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        assert!(index.search("the and of", 5).expect("search").is_empty());
    }

    #[test]
    fn identical_queries_are_deterministic() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        let first = index.search("M5 review", 3).expect("search");
        let second = index.search("M5 review", 3).expect("search");
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.0, b.0);
            assert_eq!(a.1.to_bits(), b.1.to_bits());
        }
    }

    #[test]
    fn filter_excludes_chunks_before_normalization() {
        let index = SparseIndex::build(&corpus(), Bm25Params::default()).expect("build");
        let allowed: HashSet<String> = ["b:0".to_string()].into_iter().collect();
        let hits = index.search_filtered("M5 repairs", 3, Some(&allowed)).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "b:0");
        assert!((hits[0].1 - 1.0).abs() < 1e-6, "single survivor normalizes to 1.0");
    }
}
