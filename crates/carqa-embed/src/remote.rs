//! HTTP client for an OpenAI-compatible `/embeddings` endpoint. All
//! transport failures, non-success statuses, and timeouts surface as
//! `Error::Unavailable` so the hybrid retriever can degrade to
//! sparse-only retrieval instead of failing the whole query.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::traits::Embedder;

pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    dim: usize,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(
        endpoint: String,
        model: String,
        dim: usize,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self { client, endpoint, model, dim, api_key })
    }
}

impl Embedder for RemoteEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| Error::Unavailable(format!("embedding request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Unavailable(format!("embedding service error: {e}")))?;
        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| Error::Unavailable(format!("malformed embedding response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::Unavailable(format!(
                "embedding service returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            if v.len() != self.dim {
                return Err(Error::Unavailable(format!(
                    "embedding dimension {} does not match configured {}",
                    v.len(),
                    self.dim
                )));
            }
        }
        tracing::debug!(count = vectors.len(), model = %self.model, "embedded batch");
        Ok(vectors)
    }
}
