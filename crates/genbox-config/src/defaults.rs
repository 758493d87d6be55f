//! Built-in defaults applied when no layer supplies a value.

use crate::logging::LogFormat;

/// Registry host prefixed to every catalog entry name to form an image reference.
pub const DEFAULT_REGISTRY_DOMAIN: &str = "localhost:5000";

/// Container engine CLI used to launch plugin sandboxes.
pub const DEFAULT_CONTAINER_PROGRAM: &str = "docker";

pub use genbox_sandbox::{
    DEFAULT_CPU_MILLIS, DEFAULT_MEMORY_MIB as DEFAULT_MEMORY_LIMIT_MIB, DEFAULT_OUTPUT_LIMIT_MIB,
    MAX_CPU_MILLIS,
};

/// Upper bound on the wall-clock time of a single plugin execution.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 30;

/// Size of the catalog connection pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned registry domain default.
#[must_use]
pub fn default_registry_domain() -> String {
    DEFAULT_REGISTRY_DOMAIN.to_owned()
}

/// Owned container program default.
#[must_use]
pub fn default_container_program() -> String {
    DEFAULT_CONTAINER_PROGRAM.to_owned()
}
