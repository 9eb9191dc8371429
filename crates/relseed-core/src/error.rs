use thiserror::Error;

/// Core error type shared across relseed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A requested feature is not yet supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Reading a schema export failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The schema export is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by relseed crates.
pub type Result<T> = std::result::Result<T, Error>;
