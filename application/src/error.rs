//! Application-level error type

use crate::ports::durable_store::StoreError;
use coevolve_domain::DomainError;
use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("durable store error: {0}")]
    Store(#[from] StoreError),

    #[error("session codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the underlying cause is fatal store corruption
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Domain(e) if e.is_fatal())
    }
}
