use thiserror::Error;

/// Errors surfaced by the compression and decompression pipelines.
#[derive(Debug, Error)]
pub enum BwError {
    /// Bad command line input: unknown selector characters, impossible sizes.
    #[error("usage error: {0}")]
    Usage(String),

    /// Failure in the underlying stream. Not recovered.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The compressed stream violates the format.
    #[error("malformed compressed stream: {0}")]
    MalformedStream(&'static str),

    /// Internal bookkeeping went out of sync. Indicates a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),

    /// A block buffer is too small for the preprocessor overhead bytes.
    #[error("block buffer lacks headroom for preprocessing")]
    InsufficientHeadroom,
}

pub type Result<T> = std::result::Result<T, BwError>;
