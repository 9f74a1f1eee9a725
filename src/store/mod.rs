//! Durable record of listing ids that already triggered a notification.

pub mod memory;
pub mod sqlite;

pub use memory::MemorySeenStore;
pub use sqlite::SqliteSeenStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::StoreError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// True iff `listing_id` has never been marked (or its entry was evicted).
    async fn is_new(&self, listing_id: &str) -> Result<bool, StoreError>;

    /// Idempotent insert. An existing entry keeps its original timestamp.
    async fn mark_seen(&self, listing_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Removes entries first seen strictly before `threshold`, returning how many went.
    async fn evict_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn first_seen(&self, listing_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
