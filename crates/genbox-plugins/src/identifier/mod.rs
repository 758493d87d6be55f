//! Plugin identifier grammar.
//!
//! Callers address plugins with one of three forms:
//!
//! - `name` selects the newest entry named exactly `name`;
//! - `name:latest` selects the newest entry whose name starts with `name:`;
//! - `name:tag` selects the entry named exactly `name:tag`.
//!
//! The `latest` tag is matched case-sensitively, so `name:LATEST` is an
//! ordinary tag. Parsing is pure; [`Identifier::query`] describes the single
//! catalog lookup that resolves the identifier.

use std::fmt;
use std::str::FromStr;

use crate::error::IdentifierError;

/// Tag that selects the newest tagged entry of a name.
pub const LATEST_TAG: &str = "latest";

/// Separator between a plugin name and its version tag.
pub const TAG_SEPARATOR: char = ':';

/// A parsed plugin identifier.
///
/// ```
/// use genbox_plugins::{CatalogQuery, Identifier};
///
/// let identifier = Identifier::parse("gen-a:latest").expect("valid identifier");
/// assert_eq!(identifier.name(), "gen-a");
/// assert_eq!(
///     identifier.query(),
///     CatalogQuery::LatestWithPrefix("gen-a:".to_owned())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// A name without a tag.
    Bare {
        /// Plugin name.
        name: String,
    },
    /// `name:latest`.
    Latest {
        /// Plugin name.
        name: String,
    },
    /// `name:tag` for any tag other than `latest`.
    Tagged {
        /// Plugin name.
        name: String,
        /// Version tag.
        tag: String,
    },
}

/// The catalog lookup that resolves an [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogQuery {
    /// Newest entry whose name starts with the prefix.
    LatestWithPrefix(String),
    /// Newest entry whose name equals the value exactly.
    LatestNamed(String),
}

impl Identifier {
    /// Parses `raw` into an identifier.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentifierError`] when `raw` is empty, contains more than
    /// one `:`, or has an empty name or tag around its separator.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let separators = raw.matches(TAG_SEPARATOR).count();
        if separators > 1 {
            return Err(IdentifierError::TooManySeparators {
                identifier: raw.to_owned(),
                separators,
            });
        }

        let Some((name, tag)) = raw.split_once(TAG_SEPARATOR) else {
            return Ok(Self::Bare {
                name: raw.to_owned(),
            });
        };

        if name.is_empty() {
            return Err(IdentifierError::EmptyName {
                identifier: raw.to_owned(),
            });
        }
        if tag.is_empty() {
            return Err(IdentifierError::EmptyTag {
                identifier: raw.to_owned(),
            });
        }

        if tag == LATEST_TAG {
            Ok(Self::Latest {
                name: name.to_owned(),
            })
        } else {
            Ok(Self::Tagged {
                name: name.to_owned(),
                tag: tag.to_owned(),
            })
        }
    }

    /// Plugin name without any tag.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bare { name } | Self::Latest { name } | Self::Tagged { name, .. } => name,
        }
    }

    /// Explicit version tag, if any. `latest` is not a version.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Tagged { tag, .. } => Some(tag),
            Self::Bare { .. } | Self::Latest { .. } => None,
        }
    }

    /// Catalog lookup that resolves this identifier.
    #[must_use]
    pub fn query(&self) -> CatalogQuery {
        match self {
            Self::Bare { name } => CatalogQuery::LatestNamed(name.clone()),
            Self::Latest { name } => {
                CatalogQuery::LatestWithPrefix(format!("{name}{TAG_SEPARATOR}"))
            }
            Self::Tagged { name, tag } => {
                CatalogQuery::LatestNamed(format!("{name}{TAG_SEPARATOR}{tag}"))
            }
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare { name } => f.write_str(name),
            Self::Latest { name } => write!(f, "{name}{TAG_SEPARATOR}{LATEST_TAG}"),
            Self::Tagged { name, tag } => write!(f, "{name}{TAG_SEPARATOR}{tag}"),
        }
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl CatalogQuery {
    /// The prefix or exact name being looked up.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::LatestWithPrefix(key) | Self::LatestNamed(key) => key,
        }
    }
}
