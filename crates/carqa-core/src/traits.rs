use crate::error::Result;
use crate::types::ChatMessage;

/// Embedding service contract.
///
/// The same model/version must be used at build and query time or
/// similarity scores become meaningless; `model()` and `dim()` exist so
/// index snapshots can record and enforce that invariant on load.
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Answer-generation service contract. Opaque beyond this signature;
/// transport failures surface as `Error::Unavailable` and are retried
/// by the caller, not by this core.
pub trait Generator: Send + Sync {
    fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}
