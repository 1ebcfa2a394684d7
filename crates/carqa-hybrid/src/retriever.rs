//! Fork-join hybrid retrieval with weighted score fusion.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use carqa_core::error::{Error, Result};
use carqa_core::filter::MetadataFilter;
use carqa_core::traits::Embedder;
use carqa_core::types::{ChunkId, Origin, RetrievalResult};

use crate::snapshot::{SearchSnapshot, SnapshotHandle};

/// Retrieval tuning knobs.
///
/// `alpha` weighs dense against sparse relevance (1.0 = dense only).
/// `pool_multiplier` sizes the per-index candidate pool as a multiple
/// of `k` so fusion sees more than it keeps.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
}

fn default_alpha() -> f32 {
    0.5
}

fn default_pool_multiplier() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { alpha: default_alpha(), pool_multiplier: default_pool_multiplier() }
    }
}

pub struct HybridRetriever {
    handle: Arc<SnapshotHandle>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        handle: Arc<SnapshotHandle>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.alpha) {
            return Err(Error::InvalidArgument(format!(
                "alpha must be within [0,1], got {}",
                config.alpha
            )));
        }
        if config.pool_multiplier == 0 {
            return Err(Error::InvalidArgument("pool_multiplier must be positive".to_string()));
        }
        Ok(Self { handle, embedder, config })
    }

    /// The snapshot generation queries currently read. Callers that
    /// need chunk payloads for a ranked list should hold on to this.
    pub fn snapshot(&self) -> Arc<SearchSnapshot> {
        self.handle.current()
    }

    /// Fuse dense and sparse retrieval into one ranked list of at most
    /// `k` results, against whatever snapshot is currently published.
    ///
    /// Callers that go on to resolve chunk payloads for the ranked list
    /// must pin a generation with [`Self::snapshot`] and use
    /// [`Self::retrieve_in`] instead, or a reindex landing mid-query
    /// can swap the generation out from under them.
    pub fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        let snapshot = self.handle.current();
        self.retrieve_in(&snapshot, query, k, filter)
    }

    /// Like `retrieve`, but against a caller-pinned snapshot, so the
    /// ranked list and any later chunk lookups read the same
    /// generation.
    ///
    /// Both sub-queries run concurrently against the same immutable
    /// snapshot. If the dense side fails because the embedding service
    /// is down or timed out, retrieval degrades to sparse-only; only
    /// when both sides fail does the whole query fail.
    pub fn retrieve_in(
        &self,
        snapshot: &SearchSnapshot,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".to_string()));
        }

        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        // Resolve the metadata predicate to an id set once, so both
        // indexes exclude filtered chunks before pool truncation.
        let allowed: Option<HashSet<ChunkId>> = filter.filter(|f| !f.is_empty()).map(|f| {
            snapshot
                .chunks
                .values()
                .filter(|c| f.matches(c))
                .map(|c| c.id.clone())
                .collect()
        });
        if allowed.as_ref().is_some_and(HashSet::is_empty) {
            return Ok(Vec::new());
        }

        let pool = k.saturating_mul(self.config.pool_multiplier).max(k);
        let embedder = self.embedder.as_ref();
        let allowed_ref = allowed.as_ref();

        let (dense_result, sparse_result) = std::thread::scope(|scope| {
            let dense = scope
                .spawn(move || snapshot.dense.search_text(query, embedder, pool, allowed_ref));
            let sparse = scope
                .spawn(move || snapshot.sparse.search_filtered(query, pool, allowed_ref));
            (join_worker(dense), join_worker(sparse))
        });

        let (dense_hits, dense_down) = degrade("dense", dense_result)?;
        let (sparse_hits, sparse_down) = degrade("sparse", sparse_result)?;
        if dense_down && sparse_down {
            return Err(Error::Unavailable(
                "both dense and sparse retrieval are unavailable".to_string(),
            ));
        }

        let mut ranked = fuse(&dense_hits, &sparse_hits, self.config.alpha);
        ranked.truncate(k);
        tracing::debug!(
            query,
            k,
            dense = dense_hits.len(),
            sparse = sparse_hits.len(),
            fused = ranked.len(),
            "hybrid retrieval complete"
        );
        Ok(ranked)
    }
}

fn join_worker<T>(
    handle: std::thread::ScopedJoinHandle<'_, Result<T>>,
) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(Error::Query("retrieval worker panicked".to_string())))
}

/// Map a sub-query outcome to (hits, degraded). Service outages degrade
/// to an empty pool; every other error is a real failure.
fn degrade(
    side: &str,
    result: Result<Vec<(ChunkId, f32)>>,
) -> Result<(Vec<(ChunkId, f32)>, bool)> {
    match result {
        Ok(hits) => Ok((hits, false)),
        Err(Error::Unavailable(msg)) => {
            tracing::warn!(side, %msg, "retrieval degraded: sub-query unavailable");
            Ok((Vec::new(), true))
        }
        Err(e) => Err(e),
    }
}

/// Weighted linear fusion of two normalized score pools.
///
/// For every chunk in either pool: `alpha * dense + (1 - alpha) *
/// sparse`, with 0 for a missing component. Output is sorted by fused
/// score descending, chunk id ascending on ties.
pub fn fuse(
    dense: &[(ChunkId, f32)],
    sparse: &[(ChunkId, f32)],
    alpha: f32,
) -> Vec<RetrievalResult> {
    let mut pool: BTreeMap<&ChunkId, (Option<f32>, Option<f32>)> = BTreeMap::new();
    for (id, score) in dense {
        pool.entry(id).or_default().0 = Some(*score);
    }
    for (id, score) in sparse {
        pool.entry(id).or_default().1 = Some(*score);
    }

    let mut results: Vec<RetrievalResult> = pool
        .into_iter()
        .map(|(id, (d, s))| {
            let origin = match (d, s) {
                (Some(_), Some(_)) => Origin::Both,
                (Some(_), None) => Origin::Dense,
                _ => Origin::Sparse,
            };
            RetrievalResult {
                chunk_id: id.clone(),
                score: alpha * d.unwrap_or(0.0) + (1.0 - alpha) * s.unwrap_or(0.0),
                origin,
            }
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results
}
