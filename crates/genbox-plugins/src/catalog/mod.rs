//! Read contract over the persisted plugin catalog.
//!
//! The catalog is append-only from the dispatcher's point of view: entries are
//! registered elsewhere and never modified here. Both lookups return the
//! single most recent match, ordering by creation time and breaking ties by
//! the greater identifier so repeated lookups are deterministic.

mod memory;
mod postgres;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use self::memory::MemoryCatalog;
pub use self::postgres::PgCatalog;
use crate::error::CatalogError;

/// One registered, versioned plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
        }
    }

    /// Unique identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Registered name, usually `name:tag`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Orders entries by recency: later creation first wins, then the greater
    /// id.
    #[must_use]
    pub fn cmp_recency(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Read-only access to the plugin catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Most recent entry whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when the backend cannot answer.
    async fn latest_with_prefix(&self, prefix: &str) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Most recent entry whose name equals `name` exactly.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when the backend cannot answer.
    async fn latest_named(&self, name: &str) -> Result<Option<CatalogEntry>, CatalogError>;
}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn latest_with_prefix(&self, prefix: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        (**self).latest_with_prefix(prefix).await
    }

    async fn latest_named(&self, name: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        (**self).latest_named(name).await
    }
}
