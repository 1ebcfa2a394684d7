//! carqa-sparse
//!
//! Lexical retrieval over review chunks: an in-memory inverted index
//! scored with Okapi BM25. Scores are min-max normalized to [0,1] per
//! query so they can be fused with dense similarity scores. Scoring is
//! fully deterministic: identical query and index state always produce
//! the identical ranked list.

pub mod index;
pub mod tokenize;

pub use index::{Bm25Params, SparseIndex};
pub use tokenize::tokenize;
