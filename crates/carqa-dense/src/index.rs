use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::traits::Embedder;
use carqa_core::types::{ChunkId, DocumentChunk};

/// Chunk-id to embedding mapping plus the scan structure over it.
///
/// Vectors are unit-normalized at build time so cosine similarity
/// reduces to a dot product. Similarity is mapped from [-1,1] to [0,1]
/// via `(cos + 1) / 2` to make it fusion-comparable with sparse scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseIndex {
    dim: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    /// Embed every chunk and store its vector. Fails with an ingestion
    /// error on malformed chunks or on a dimension mismatch from the
    /// embedding service; a failed build leaves nothing half-written.
    pub fn build(chunks: &[DocumentChunk], embedder: &dyn Embedder) -> Result<Self> {
        carqa_core::types::validate_chunks(chunks)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Ingestion(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dim = embedder.dim();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut vectors = Vec::with_capacity(chunks.len());
        for (chunk, mut vector) in chunks.iter().zip(embeddings) {
            if vector.len() != dim {
                return Err(Error::Ingestion(format!(
                    "chunk '{}' embedded to dimension {} (expected {})",
                    chunk.id,
                    vector.len(),
                    dim
                )));
            }
            normalize(&mut vector);
            ids.push(chunk.id.clone());
            vectors.push(vector);
        }

        tracing::debug!(chunks = ids.len(), dim, "built dense index");
        Ok(Self { dim, ids, vectors })
    }

    /// Index with no vectors. Searching it is a query error, same as
    /// any other empty index.
    pub fn empty(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), vectors: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embed the query with the same model used at build time, then
    /// scan. The embedding call is this crate's only suspension point;
    /// a timeout surfaces as `Error::Unavailable` from the embedder.
    pub fn search_text(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        n: usize,
        allowed: Option<&HashSet<ChunkId>>,
    ) -> Result<Vec<(ChunkId, f32)>> {
        if self.is_empty() {
            return Err(Error::Query("dense index is empty".to_string()));
        }
        if n == 0 {
            return Err(Error::Query("requested result count must be positive".to_string()));
        }
        let mut query_vec = embedder
            .embed_batch(std::slice::from_ref(&query.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Unavailable("embedder returned no query vector".to_string()))?;
        normalize(&mut query_vec);
        self.search_vec(&query_vec, n, allowed)
    }

    /// Top-`n` nearest chunks by cosine similarity, scores in [0,1],
    /// ties broken by ascending chunk id.
    pub fn search_vec(
        &self,
        query_vec: &[f32],
        n: usize,
        allowed: Option<&HashSet<ChunkId>>,
    ) -> Result<Vec<(ChunkId, f32)>> {
        if self.is_empty() {
            return Err(Error::Query("dense index is empty".to_string()));
        }
        if n == 0 {
            return Err(Error::Query("requested result count must be positive".to_string()));
        }
        if query_vec.len() != self.dim {
            return Err(Error::Query(format!(
                "query vector dimension {} does not match index dimension {}",
                query_vec.len(),
                self.dim
            )));
        }

        let mut hits: Vec<(ChunkId, f32)> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .filter(|(id, _)| allowed.map_or(true, |a| a.contains(*id)))
            .map(|(id, vector)| {
                let cos: f32 = vector.iter().zip(query_vec).map(|(a, b)| a * b).sum();
                (id.clone(), ((cos + 1.0) / 2.0).clamp(0.0, 1.0))
            })
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(n);
        Ok(hits)
    }
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
