use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SeenStore;
use crate::core::error::StoreError;

/// Non-durable store for tests and dry runs.
#[derive(Default)]
pub struct MemorySeenStore {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn is_new(&self, listing_id: &str) -> Result<bool, StoreError> {
        Ok(!self.entries.read().await.contains_key(listing_id))
    }

    async fn mark_seen(&self, listing_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .entry(listing_id.to_string())
            .or_insert(at);
        Ok(())
    }

    async fn evict_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, first_seen| *first_seen >= threshold);
        Ok((before - entries.len()) as u64)
    }

    async fn first_seen(&self, listing_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.entries.read().await.get(listing_id).copied())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.entries.read().await.len() as u64)
    }
}
