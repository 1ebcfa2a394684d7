//! Immutable index snapshots and the swappable handle queries read
//! through. Reindexing is always whole-corpus: build a new snapshot off
//! to the side, then publish it with a single pointer swap.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::traits::Embedder;
use carqa_core::types::{ChunkId, DocumentChunk};
use carqa_dense::DenseIndex;
use carqa_sparse::{Bm25Params, SparseIndex};

/// Bumped when the persisted layout changes; older snapshots are
/// rejected with a reindex hint instead of being misread.
const SNAPSHOT_VERSION: u32 = 1;

/// One fully built, immutable generation of both indexes plus the chunk
/// store they were built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub chunks: BTreeMap<ChunkId, DocumentChunk>,
    pub dense: DenseIndex,
    pub sparse: SparseIndex,
    pub embed_model: String,
    pub dim: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedSnapshot {
    version: u32,
    snapshot: SearchSnapshot,
}

impl SearchSnapshot {
    /// Build both indexes from the same chunk set. All-or-nothing: any
    /// ingestion failure discards the partial build.
    pub fn build(
        chunks: Vec<DocumentChunk>,
        embedder: &dyn Embedder,
        bm25: Bm25Params,
    ) -> Result<Self> {
        let dense = DenseIndex::build(&chunks, embedder)?;
        let sparse = SparseIndex::build(&chunks, bm25)?;
        let chunks: BTreeMap<ChunkId, DocumentChunk> =
            chunks.into_iter().map(|c| (c.id.clone(), c)).collect();
        tracing::info!(chunks = chunks.len(), model = embedder.model(), "built search snapshot");
        Ok(Self {
            chunks,
            dense,
            sparse,
            embed_model: embedder.model().to_string(),
            dim: embedder.dim(),
        })
    }

    /// Snapshot with no chunks, used as the initial published state.
    pub fn empty(embedder: &dyn Embedder) -> Self {
        Self {
            chunks: BTreeMap::new(),
            dense: DenseIndex::empty(embedder.dim()),
            sparse: SparseIndex::empty(Bm25Params::default()),
            embed_model: embedder.model().to_string(),
            dim: embedder.dim(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let persisted = PersistedSnapshot { version: SNAPSHOT_VERSION, snapshot: self.clone() };
        let encoded = serde_json::to_vec(&persisted)
            .map_err(|e| Error::Ingestion(format!("failed to encode snapshot: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Ingestion(format!("failed to create snapshot dir: {e}")))?;
        }
        std::fs::write(path, encoded)
            .map_err(|e| Error::Ingestion(format!("failed to write snapshot: {e}")))?;
        tracing::info!(path = %path.display(), chunks = self.chunks.len(), "saved snapshot");
        Ok(())
    }

    /// Load a snapshot and verify it was built with the embedder the
    /// caller is about to query with. A model or dimension mismatch
    /// would make similarity scores meaningless, so it is refused.
    pub fn load(path: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Ingestion(format!("failed to read snapshot: {e}")))?;
        let persisted: PersistedSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Ingestion(format!("failed to decode snapshot: {e}")))?;
        if persisted.version != SNAPSHOT_VERSION {
            return Err(Error::Ingestion(format!(
                "snapshot version {} is not supported (expected {}); reindex required",
                persisted.version, SNAPSHOT_VERSION
            )));
        }
        let snapshot = persisted.snapshot;
        if snapshot.embed_model != embedder.model() || snapshot.dim != embedder.dim() {
            return Err(Error::Ingestion(format!(
                "snapshot was built with model '{}' (dim {}), configured embedder is '{}' (dim {}); reindex required",
                snapshot.embed_model,
                snapshot.dim,
                embedder.model(),
                embedder.dim()
            )));
        }
        Ok(snapshot)
    }
}

/// Versioned, swappable reference to the current snapshot.
///
/// Queries clone the inner `Arc` (one pointer read under a read lock)
/// and keep using that generation even if a rebuild publishes a newer
/// one mid-query. No query ever blocks for the duration of a rebuild.
pub struct SnapshotHandle {
    inner: RwLock<Arc<SearchSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: SearchSnapshot) -> Self {
        Self { inner: RwLock::new(Arc::new(snapshot)) }
    }

    pub fn current(&self) -> Arc<SearchSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, snapshot: SearchSnapshot) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}
