//! carqa-hybrid
//!
//! The retrieval core: queries the dense and sparse indexes fork-join,
//! fuses their normalized scores into one deterministic ranked list,
//! and assembles the winners into a bounded, review-type-labeled
//! context block for prompt injection. Index state lives in immutable
//! snapshots behind an atomically swappable handle, so queries never
//! observe a half-built index.

pub mod assemble;
pub mod retriever;
pub mod snapshot;

pub use assemble::{assemble, AssembledContext, AssemblerConfig, Excerpt};
pub use retriever::{fuse, HybridRetriever, RetrievalConfig};
pub use snapshot::{SearchSnapshot, SnapshotHandle};
