//! In-process catalog used by tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{CatalogEntry, CatalogStore};
use crate::error::CatalogError;

/// Catalog held in memory behind a read-write lock.
///
/// ```
/// use chrono::Utc;
/// use genbox_plugins::MemoryCatalog;
///
/// let catalog = MemoryCatalog::new();
/// catalog.register("gen-a:v1", Utc::now());
/// assert_eq!(catalog.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn insert(&self, entry: CatalogEntry) {
        self.entries.write().push(entry);
    }

    /// Appends a new entry with a random id and returns it.
    pub fn register(&self, name: impl Into<String>, created_at: DateTime<Utc>) -> CatalogEntry {
        let entry = CatalogEntry::new(Uuid::new_v4(), name, created_at);
        self.insert(entry.clone());
        entry
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the catalog holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn latest_matching(&self, matches: impl Fn(&CatalogEntry) -> bool) -> Option<CatalogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| matches(entry))
            .max_by(|left, right| left.cmp_recency(right))
            .cloned()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn latest_with_prefix(&self, prefix: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.latest_matching(|entry| entry.name().starts_with(prefix)))
    }

    async fn latest_named(&self, name: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.latest_matching(|entry| entry.name() == name))
    }
}
