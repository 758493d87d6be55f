//! Identifier resolution against the catalog.
//!
//! The [`Resolver`] parses an identifier, performs exactly one catalog lookup
//! and pairs the matching entry with the image reference the sandbox should
//! run. It never caches: every call observes the catalog as it is.

use std::fmt;

use tracing::debug;

use crate::catalog::{CatalogEntry, CatalogStore};
use crate::error::ResolveError;
use crate::identifier::{CatalogQuery, Identifier};

const RESOLVER_TARGET: &str = "genbox_plugins::resolver";

/// Registry host that prefixes every image reference.
///
/// Trailing `/` characters are removed so `registry.local/` and
/// `registry.local` produce the same references.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryDomain(String);

impl RegistryDomain {
    /// Normalizes `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        let mut normalized: String = domain.into();
        let trimmed = normalized.trim_end_matches('/').len();
        normalized.truncate(trimmed);
        Self(normalized)
    }

    /// Normalized domain.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RegistryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified container image reference, `<domain>/<entry name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference(String);

impl ImageReference {
    /// Builds the reference for `entry` under `domain`.
    #[must_use]
    pub fn new(domain: &RegistryDomain, entry: &CatalogEntry) -> Self {
        Self(format!("{}/{}", domain.as_str(), entry.name()))
    }

    /// Reference as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog entry paired with the image that runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlugin {
    entry: CatalogEntry,
    image: ImageReference,
}

impl ResolvedPlugin {
    /// The matched catalog entry.
    #[must_use]
    pub const fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    /// Image reference for the sandbox.
    #[must_use]
    pub const fn image(&self) -> &ImageReference {
        &self.image
    }
}

/// Maps identifiers to catalog entries.
///
/// ```
/// use chrono::Utc;
/// use genbox_plugins::{MemoryCatalog, RegistryDomain, Resolver};
///
/// let catalog = MemoryCatalog::new();
/// catalog.register("gen-a:v1", Utc::now());
/// let resolver = Resolver::new(catalog, RegistryDomain::new("registry.local"));
///
/// let runtime = tokio::runtime::Builder::new_current_thread()
///     .build()
///     .expect("runtime");
/// let plugin = runtime
///     .block_on(resolver.resolve("gen-a:v1"))
///     .expect("resolved");
/// assert_eq!(plugin.image().as_str(), "registry.local/gen-a:v1");
/// ```
#[derive(Debug)]
pub struct Resolver<C> {
    catalog: C,
    domain: RegistryDomain,
}

impl<C> Resolver<C> {
    /// Creates a resolver over `catalog` that builds references under
    /// `domain`.
    #[must_use]
    pub const fn new(catalog: C, domain: RegistryDomain) -> Self {
        Self { catalog, domain }
    }

    /// The underlying catalog.
    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The registry domain.
    #[must_use]
    pub const fn domain(&self) -> &RegistryDomain {
        &self.domain
    }
}

impl<C: CatalogStore> Resolver<C> {
    /// Resolves `identifier` to exactly one catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidIdentifier`] for malformed identifiers
    /// without touching the catalog, [`ResolveError::NotFound`] when nothing
    /// matches, and [`ResolveError::Catalog`] when the lookup fails.
    pub async fn resolve(&self, identifier: &str) -> Result<ResolvedPlugin, ResolveError> {
        let parsed = Identifier::parse(identifier)?;
        let query = parsed.query();

        let found = match &query {
            CatalogQuery::LatestWithPrefix(prefix) => self.catalog.latest_with_prefix(prefix).await,
            CatalogQuery::LatestNamed(name) => self.catalog.latest_named(name).await,
        }
        .map_err(|source| ResolveError::Catalog {
            identifier: identifier.to_owned(),
            source,
        })?;

        let Some(entry) = found else {
            debug!(
                target: RESOLVER_TARGET,
                identifier,
                key = query.key(),
                "no catalog entry matched"
            );
            return Err(ResolveError::NotFound {
                identifier: identifier.to_owned(),
            });
        };

        let image = ImageReference::new(&self.domain, &entry);
        debug!(
            target: RESOLVER_TARGET,
            identifier,
            entry_id = %entry.id(),
            image = image.as_str(),
            "identifier resolved"
        );
        Ok(ResolvedPlugin { entry, image })
    }
}
