use thiserror::Error;

/// Error taxonomy shared by every engine crate.
///
/// All variants are scoped to a single build or query call. A failed
/// build never replaces a previously published snapshot, and a failed
/// query has no effect on later queries.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input chunk or inconsistent embeddings at build time.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// Empty index or invalid query at search time.
    #[error("query failed: {0}")]
    Query(String),

    /// Caller-supplied argument rejected before any index access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Retrieval succeeded but no displayable context could be built.
    #[error("context assembly failed: {0}")]
    Assembly(String),

    /// An external service (embedding or generation) is degraded or
    /// timed out. Recoverable by the caller via retry with backoff.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
