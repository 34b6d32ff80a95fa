//! In-process durable store
//!
//! Keyed byte storage with per-entry expiry, the default [`DurableStore`]
//! backing when no external store is configured. Expired entries are
//! dropped lazily on read and swept opportunistically on write.

use async_trait::async_trait;
use coevolve_application::ports::durable_store::{DurableStore, StoreError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-memory [`DurableStore`] honoring TTLs
#[derive(Default)]
pub struct InMemoryDurableStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) entry count
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| StoreError::Backend(format!("ttl overflow: {ttl:?}")))?;

        let mut entries = self.entries.lock().expect("store mutex poisoned");
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(key.to_string(), Entry { bytes: value, expires_at });
        Ok(())
    }
}
