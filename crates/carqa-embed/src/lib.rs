//! carqa-embed
//!
//! `Embedder` implementations behind the core trait: a deterministic
//! hashing embedder for offline runs and tests, and an HTTP client for
//! an OpenAI-compatible embeddings endpoint. Whatever the backend, the
//! same model must serve both index build and query embedding; the
//! snapshot layer enforces that with `Embedder::model` / `dim`.

pub mod hash;
pub mod remote;

use serde::Deserialize;

use carqa_core::error::{Error, Result};
use carqa_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use remote::RemoteEmbedder;

/// Embedding section of the application config.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "hash".to_string()
}

fn default_model() -> String {
    "gte-large-en-v1.5".to_string()
}

fn default_api_key_env() -> String {
    "CARQA_EMBED_API_KEY".to_string()
}

fn default_dim() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            api_key_env: default_api_key_env(),
            dim: default_dim(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Construct the configured embedder.
pub fn embedder_from_config(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match cfg.provider.as_str() {
        "hash" => Ok(Box::new(HashEmbedder::new(cfg.dim))),
        "remote" => {
            let endpoint = cfg.endpoint.clone().ok_or_else(|| {
                Error::InvalidArgument("embedding.endpoint is required for provider=remote".to_string())
            })?;
            let api_key = std::env::var(&cfg.api_key_env).ok();
            Ok(Box::new(RemoteEmbedder::new(
                endpoint,
                cfg.model.clone(),
                cfg.dim,
                api_key,
                cfg.timeout_secs,
            )?))
        }
        other => Err(Error::InvalidArgument(format!(
            "unknown embedding provider '{other}' (expected 'hash' or 'remote')"
        ))),
    }
}
