//! Domain types shared by the dense, sparse, and hybrid engines.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Upper bound on chunk payload size accepted at index build time.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Classification of a chunk's source review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    /// Professional evaluation from a test drive.
    Expert,
    /// Real-world ownership experience over time.
    LongTerm,
}

impl ReviewType {
    pub fn label(self) -> &'static str {
        match self {
            ReviewType::Expert => "Expert review",
            ReviewType::LongTerm => "Long-term review",
        }
    }
}

/// Vehicle facet carried by every chunk. `body_type` and `year` are
/// optional because older scraped reviews do not always carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleMeta {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl VehicleMeta {
    /// "2019 bmw M5" style display string used in prompt labels.
    pub fn display_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} {} {}", year, self.make.to_lowercase(), self.model),
            None => format!("{} {}", self.make.to_lowercase(), self.model),
        }
    }
}

/// Unit of retrieval. Immutable once created; retired only by a full
/// reindex, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub content: String,
    pub review_type: ReviewType,
    pub vehicle: VehicleMeta,
    pub chunk_index: usize,
}

/// Which index produced (or contributed to) a retrieval result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Dense,
    Sparse,
    Both,
}

/// One entry of a ranked list. Transient, created per query.
///
/// `score` is the fused relevance in [0,1]; higher is better. Ties are
/// broken by ascending `chunk_id` so identical queries always yield
/// identical orderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub origin: Origin,
}

/// Role of a conversation message passed to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior turn of the conversation. Generator input only; the
/// retrieval core does not read history beyond query focusing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Validate a chunk set before any index build touches it.
///
/// Builds are all-or-nothing: a single bad chunk fails the whole build
/// and leaves any previously published index untouched.
pub fn validate_chunks(chunks: &[DocumentChunk]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.id.is_empty() {
            return Err(Error::Ingestion("chunk with empty id".to_string()));
        }
        if !seen.insert(chunk.id.as_str()) {
            return Err(Error::Ingestion(format!("duplicate chunk id '{}'", chunk.id)));
        }
        if chunk.content.trim().is_empty() {
            return Err(Error::Ingestion(format!(
                "chunk '{}' has empty content after normalization",
                chunk.id
            )));
        }
        if chunk.content.chars().count() > MAX_CHUNK_CHARS {
            return Err(Error::Ingestion(format!(
                "chunk '{}' exceeds {} characters",
                chunk.id, MAX_CHUNK_CHARS
            )));
        }
    }
    Ok(())
}
