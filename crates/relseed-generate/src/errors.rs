use thiserror::Error;

use relseed_store::StoreError;

/// Errors that stop a seeding run before it starts writing.
///
/// Per-record and per-entity failures never surface here; they are recorded in
/// the [`SeedReport`](crate::model::SeedReport) instead.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Core(#[from] relseed_core::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}
