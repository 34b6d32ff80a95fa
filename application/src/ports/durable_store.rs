//! Durable store port
//!
//! The durable store is the authority for voting-session state across
//! process restarts; the in-memory session map is a reconstructable cache
//! on top of it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the durable store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("store operation failed: {0}")]
    Backend(String),
}

/// Key-value persistence with a bounded TTL per entry
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch a value, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration)
    -> Result<(), StoreError>;
}
