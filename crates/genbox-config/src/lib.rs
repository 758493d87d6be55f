//! Shared configuration for the genbox dispatch service.
//!
//! [`Config`] is loaded through `ortho_config`, which layers values in
//! ascending precedence: built-in defaults, a TOML file (discovered through
//! `--config-path` or `GENBOX_CONFIG_PATH`), `GENBOX_*` environment variables
//! and finally command-line flags. The resulting value carries everything the
//! daemon needs to reach the plugin catalog, build image references, bound
//! sandboxed executions and configure telemetry.
//!
//! Loading never validates semantic ranges; call [`Config::validate`] once the
//! layers have been merged so unusable settings (a zero memory ceiling, a CPU
//! allowance above one core, an empty registry domain) fail before any work
//! starts. The resource defaults are those of [`genbox_sandbox`].

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CONTAINER_PROGRAM, DEFAULT_CPU_MILLIS, DEFAULT_DATABASE_MAX_CONNECTIONS,
    DEFAULT_EXECUTION_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MEMORY_LIMIT_MIB,
    DEFAULT_OUTPUT_LIMIT_MIB, DEFAULT_REGISTRY_DOMAIN, MAX_CPU_MILLIS, default_container_program,
    default_log_filter, default_log_filter_string, default_log_format, default_registry_domain,
};
pub use logging::LogFormat;

/// Runtime configuration shared by the dispatch binaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GENBOX")]
pub struct Config {
    /// Postgres connection string for the plugin catalog.
    pub database_url: Option<String>,
    /// Maximum number of pooled catalog connections.
    #[ortho_config(default = DEFAULT_DATABASE_MAX_CONNECTIONS)]
    pub database_max_connections: u32,
    /// Registry host prefixed to catalog entry names.
    #[ortho_config(default = default_registry_domain())]
    pub registry_domain: String,
    /// Container engine CLI used to launch sandboxes.
    #[ortho_config(default = default_container_program())]
    pub container_program: String,
    /// Memory ceiling per execution, in mebibytes.
    #[ortho_config(default = DEFAULT_MEMORY_LIMIT_MIB)]
    pub memory_limit_mib: u64,
    /// CPU allowance per execution, in thousandths of a core. At most one core.
    #[ortho_config(default = DEFAULT_CPU_MILLIS)]
    pub cpu_millis: u32,
    /// Cap on each output stream captured from a plugin, in mebibytes.
    #[ortho_config(default = DEFAULT_OUTPUT_LIMIT_MIB)]
    pub output_limit_mib: u64,
    /// Wall-clock bound per execution, in seconds.
    #[ortho_config(default = DEFAULT_EXECUTION_TIMEOUT_SECS)]
    pub execution_timeout_secs: u64,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            registry_domain: default_registry_domain(),
            container_program: default_container_program(),
            memory_limit_mib: DEFAULT_MEMORY_LIMIT_MIB,
            cpu_millis: DEFAULT_CPU_MILLIS,
            output_limit_mib: DEFAULT_OUTPUT_LIMIT_MIB,
            execution_timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Catalog connection string, when one was configured.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Maximum number of pooled catalog connections.
    #[must_use]
    pub const fn database_max_connections(&self) -> u32 {
        self.database_max_connections
    }

    /// Registry host used to build image references.
    #[must_use]
    pub fn registry_domain(&self) -> &str {
        self.registry_domain.as_str()
    }

    /// Container engine CLI.
    #[must_use]
    pub fn container_program(&self) -> &str {
        self.container_program.as_str()
    }

    /// Memory ceiling per execution, in mebibytes.
    #[must_use]
    pub const fn memory_limit_mib(&self) -> u64 {
        self.memory_limit_mib
    }

    /// CPU allowance per execution, in thousandths of a core.
    #[must_use]
    pub const fn cpu_millis(&self) -> u32 {
        self.cpu_millis
    }

    /// Cap on each captured plugin output stream, in mebibytes.
    #[must_use]
    pub const fn output_limit_mib(&self) -> u64 {
        self.output_limit_mib
    }

    /// Wall-clock bound per execution.
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Rejects settings that would make every execution fail.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking the registry domain,
    /// container program, resource limits and timeout in that order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_domain.trim().is_empty() {
            return Err(ConfigError::EmptyRegistryDomain);
        }
        if self.container_program.trim().is_empty() {
            return Err(ConfigError::EmptyContainerProgram);
        }
        if self.memory_limit_mib == 0 {
            return Err(ConfigError::ZeroMemoryLimit);
        }
        if self.cpu_millis == 0 {
            return Err(ConfigError::ZeroCpuLimit);
        }
        if self.cpu_millis > MAX_CPU_MILLIS {
            return Err(ConfigError::CpuLimitAboveOneCore {
                requested: self.cpu_millis,
            });
        }
        if self.output_limit_mib == 0 {
            return Err(ConfigError::ZeroOutputLimit);
        }
        if self.execution_timeout_secs == 0 {
            return Err(ConfigError::ZeroExecutionTimeout);
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(())
    }
}

/// Semantic validation failures for a merged [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `registry_domain` was blank.
    #[error("registry_domain must not be empty")]
    EmptyRegistryDomain,
    /// `container_program` was blank.
    #[error("container_program must not be empty")]
    EmptyContainerProgram,
    /// `memory_limit_mib` was zero.
    #[error("memory_limit_mib must be greater than zero")]
    ZeroMemoryLimit,
    /// `cpu_millis` was zero.
    #[error("cpu_millis must be greater than zero")]
    ZeroCpuLimit,
    /// `cpu_millis` asked for more than one logical core.
    #[error("cpu_millis must not exceed 1000 (one core), got {requested}")]
    CpuLimitAboveOneCore {
        /// Rejected allowance.
        requested: u32,
    },
    /// `output_limit_mib` was zero.
    #[error("output_limit_mib must be greater than zero")]
    ZeroOutputLimit,
    /// `execution_timeout_secs` was zero.
    #[error("execution_timeout_secs must be greater than zero")]
    ZeroExecutionTimeout,
    /// `database_max_connections` was zero.
    #[error("database_max_connections must be greater than zero")]
    ZeroPoolSize,
}
