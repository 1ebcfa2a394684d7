//! carqa-dense
//!
//! Semantic retrieval over review chunks: embeds each chunk once at
//! build time, stores unit-normalized vectors, and answers queries with
//! an exact cosine scan. The corpus is a few thousand chunks, so a flat
//! scan beats the bookkeeping cost of an approximate structure and
//! keeps results exactly reproducible.

pub mod index;

pub use index::DenseIndex;
