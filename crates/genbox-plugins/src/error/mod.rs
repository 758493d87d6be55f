//! Domain errors raised while resolving and executing plugins.
//!
//! Every failure surfaced by [`Generator::generate`](crate::Generator::generate)
//! is a [`GenerateError`], and every [`GenerateError`] belongs to exactly one
//! [`ErrorKind`]. The kind set is closed so transport adapters can map it
//! exhaustively through [`ErrorKind::status_code`]. Backend errors are wrapped
//! in `Arc` to satisfy the `result_large_err` Clippy lint and keep the enums
//! cloneable where the source is.

use std::fmt;
use std::sync::Arc;

use genbox_sandbox::SandboxError;
use thiserror::Error;

/// Stable classification of a generation failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The identifier is malformed.
    InvalidIdentifier,
    /// No catalog entry matches the identifier.
    NotFound,
    /// The plugin's output could not be decoded.
    ProtocolError,
    /// The plugin ran but reported failure.
    GenerationFailed,
    /// The caller's deadline or the executor timeout elapsed.
    DeadlineExceeded,
    /// The caller abandoned the call.
    Canceled,
    /// A backing service failed independently of the caller's input.
    Internal,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    #[cfg(test)]
    pub(crate) const ALL: [Self; 7] = [
        Self::InvalidIdentifier,
        Self::NotFound,
        Self::ProtocolError,
        Self::GenerationFailed,
        Self::DeadlineExceeded,
        Self::Canceled,
        Self::Internal,
    ];

    /// Stable snake-case label used in logs and structured output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "invalid_identifier",
            Self::NotFound => "not_found",
            Self::ProtocolError => "protocol_error",
            Self::GenerationFailed => "generation_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Canceled => "canceled",
            Self::Internal => "internal",
        }
    }

    /// Transport status reported to remote callers.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidIdentifier => StatusCode::InvalidArgument,
            Self::NotFound => StatusCode::NotFound,
            Self::ProtocolError | Self::GenerationFailed | Self::Internal => StatusCode::Internal,
            Self::DeadlineExceeded => StatusCode::DeadlineExceeded,
            Self::Canceled => StatusCode::Cancelled,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RPC-style status codes understood by transport adapters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The request itself was unacceptable.
    InvalidArgument,
    /// The addressed resource does not exist.
    NotFound,
    /// The server failed to complete the request.
    Internal,
    /// The request ran out of time.
    DeadlineExceeded,
    /// The request was cancelled by the caller.
    Cancelled,
}

impl StatusCode {
    /// Canonical upper-snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an identifier string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The identifier was the empty string.
    #[error("plugin identifier is empty")]
    Empty,

    /// More than one `:` separator was present.
    #[error("plugin identifier '{identifier}' contains {separators} ':' separators; at most one is allowed")]
    TooManySeparators {
        /// Identifier as supplied.
        identifier: String,
        /// Number of separators found.
        separators: usize,
    },

    /// Nothing precedes the separator.
    #[error("plugin identifier '{identifier}' has an empty name")]
    EmptyName {
        /// Identifier as supplied.
        identifier: String,
    },

    /// Nothing follows the separator.
    #[error("plugin identifier '{identifier}' has an empty version tag")]
    EmptyTag {
        /// Identifier as supplied.
        identifier: String,
    },
}

/// Failures reported by a catalog backend.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The connection pool could not be established.
    #[error("failed to connect to the plugin catalog: {source}")]
    Connect {
        /// Underlying driver error.
        #[source]
        source: Arc<sqlx::Error>,
    },

    /// A catalog query failed.
    #[error("plugin catalog query '{operation}' failed: {source}")]
    Query {
        /// Name of the failing operation.
        operation: &'static str,
        /// Underlying driver error.
        #[source]
        source: Arc<sqlx::Error>,
    },

    /// Applying schema migrations failed.
    #[error("failed to migrate the plugin catalog: {source}")]
    Migrate {
        /// Underlying migration error.
        #[source]
        source: Arc<sqlx::migrate::MigrateError>,
    },
}

/// Failures while mapping an identifier to a catalog entry.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The identifier is malformed.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    /// No entry matches the identifier.
    #[error("plugin '{identifier}' not found in catalog")]
    NotFound {
        /// Identifier as supplied.
        identifier: String,
    },

    /// The catalog could not answer.
    #[error("failed to resolve plugin '{identifier}': {source}")]
    Catalog {
        /// Identifier as supplied.
        identifier: String,
        /// Backend failure.
        #[source]
        source: CatalogError,
    },
}

/// Failures while running one plugin image.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The plugin exited with a non-zero status or was killed by a signal.
    #[error("plugin image '{image}' {}", describe_exit(.exit_code.as_ref()))]
    Failed {
        /// Image that ran.
        image: String,
        /// Exit code; `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error, verbatim.
        stderr: Vec<u8>,
    },

    /// The plugin exited cleanly but its output is not a valid response.
    #[error("plugin image '{image}' wrote an undecodable response: {source}")]
    Protocol {
        /// Image that ran.
        image: String,
        /// Decoder failure.
        #[source]
        source: prost::DecodeError,
    },

    /// The deadline elapsed before the plugin finished.
    #[error("plugin image '{image}' exceeded its deadline")]
    DeadlineExceeded {
        /// Image that ran.
        image: String,
    },

    /// The caller cancelled the execution.
    #[error("plugin image '{image}' was cancelled")]
    Canceled {
        /// Image that ran.
        image: String,
    },

    /// The sandbox could not be started or communicated with.
    #[error("sandbox failure for plugin image '{image}': {source}")]
    Sandbox {
        /// Image that was requested.
        image: String,
        /// Runtime failure.
        #[source]
        source: SandboxError,
    },
}

/// Failures surfaced by the orchestrator to its callers.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// The identifier is malformed.
    #[error("invalid plugin identifier: {0}")]
    InvalidIdentifier(#[source] IdentifierError),

    /// No catalog entry matches the identifier.
    #[error("plugin '{identifier}' not found in catalog")]
    NotFound {
        /// Identifier as supplied.
        identifier: String,
    },

    /// The plugin's response could not be decoded.
    #[error("plugin '{identifier}' returned an undecodable response: {source}")]
    Protocol {
        /// Identifier as supplied.
        identifier: String,
        /// Decoder failure.
        #[source]
        source: prost::DecodeError,
    },

    /// The plugin ran and reported failure, either through its exit status or
    /// through the response's error field.
    #[error("plugin '{identifier}' failed: {message}")]
    GenerationFailed {
        /// Identifier as supplied.
        identifier: String,
        /// Human-readable reason.
        message: String,
        /// Exit code when the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard error, verbatim.
        stderr: Vec<u8>,
    },

    /// The deadline elapsed first.
    #[error("plugin '{identifier}' exceeded its deadline")]
    DeadlineExceeded {
        /// Identifier as supplied.
        identifier: String,
    },

    /// The caller cancelled the call.
    #[error("plugin '{identifier}' call was cancelled")]
    Canceled {
        /// Identifier as supplied.
        identifier: String,
    },

    /// The catalog could not answer.
    #[error("plugin catalog failed while resolving '{identifier}': {source}")]
    Catalog {
        /// Identifier as supplied.
        identifier: String,
        /// Backend failure.
        #[source]
        source: CatalogError,
    },

    /// The sandbox could not be started or communicated with.
    #[error("sandbox failed while running '{identifier}': {source}")]
    Sandbox {
        /// Identifier as supplied.
        identifier: String,
        /// Runtime failure.
        #[source]
        source: SandboxError,
    },
}

impl GenerateError {
    /// Classification of this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Canceled { .. } => ErrorKind::Canceled,
            Self::Catalog { .. } | Self::Sandbox { .. } => ErrorKind::Internal,
        }
    }

    /// Captured diagnostic output, for failures that carry any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&[u8]> {
        match self {
            Self::GenerationFailed { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }

    /// Builds the orchestrator error for an execution failure of the plugin
    /// addressed by `requested`.
    #[must_use]
    pub fn from_execution(requested: &str, error: ExecutionError) -> Self {
        let identifier = requested.to_owned();
        match error {
            ExecutionError::Failed {
                exit_code, stderr, ..
            } => Self::GenerationFailed {
                identifier,
                message: describe_exit(exit_code.as_ref()),
                exit_code,
                stderr,
            },
            ExecutionError::Protocol { source, .. } => Self::Protocol { identifier, source },
            ExecutionError::DeadlineExceeded { .. } => Self::DeadlineExceeded { identifier },
            ExecutionError::Canceled { .. } => Self::Canceled { identifier },
            ExecutionError::Sandbox { source, .. } => Self::Sandbox { identifier, source },
        }
    }
}

impl From<ResolveError> for GenerateError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::InvalidIdentifier(source) => Self::InvalidIdentifier(source),
            ResolveError::NotFound { identifier } => Self::NotFound { identifier },
            ResolveError::Catalog { identifier, source } => Self::Catalog { identifier, source },
        }
    }
}

fn describe_exit(exit_code: Option<&i32>) -> String {
    exit_code.map_or_else(
        || "was terminated by a signal".to_owned(),
        |code| format!("exited with non-zero status {code}"),
    )
}
