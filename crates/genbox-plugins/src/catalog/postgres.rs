//! Postgres-backed catalog.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogEntry, CatalogStore};
use crate::error::CatalogError;

const CATALOG_TARGET: &str = "genbox_plugins::catalog";

const LATEST_WITH_PREFIX: &str = r"
    SELECT id, name, created_at
    FROM plugins
    WHERE name LIKE $1 ESCAPE '\'
    ORDER BY created_at DESC, id DESC
    LIMIT 1
";

const LATEST_NAMED: &str = r"
    SELECT id, name, created_at
    FROM plugins
    WHERE name = $1
    ORDER BY created_at DESC, id DESC
    LIMIT 1
";

#[derive(Debug, sqlx::FromRow)]
struct PluginRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<PluginRow> for CatalogEntry {
    fn from(row: PluginRow) -> Self {
        Self::new(row.id, row.name, row.created_at)
    }
}

/// Catalog stored in the `plugins` table of a Postgres database.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Opens a pool of at most `max_connections` connections to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connect`] when the database is unreachable or
    /// rejects the credentials.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|source| CatalogError::Connect {
                source: Arc::new(source),
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Migrate`] when a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), CatalogError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|source| CatalogError::Migrate {
                source: Arc::new(source),
            })
    }

    /// Verifies that the database answers a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Query`] when the round trip fails.
    pub async fn health(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(query_error("health"))
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_latest(
        &self,
        operation: &'static str,
        sql: &'static str,
        value: String,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        let row = sqlx::query_as::<_, PluginRow>(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error(operation))?;
        debug!(
            target: CATALOG_TARGET,
            operation,
            found = row.is_some(),
            "catalog lookup finished"
        );
        Ok(row.map(CatalogEntry::from))
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn latest_with_prefix(&self, prefix: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        self.fetch_latest(
            "latest_with_prefix",
            LATEST_WITH_PREFIX,
            like_prefix_pattern(prefix),
        )
        .await
    }

    async fn latest_named(&self, name: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        self.fetch_latest("latest_named", LATEST_NAMED, name.to_owned())
            .await
    }
}

fn query_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CatalogError {
    move |source| CatalogError::Query {
        operation,
        source: Arc::new(source),
    }
}

/// Builds a `LIKE` pattern matching names that start with `prefix` literally.
pub(crate) fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
