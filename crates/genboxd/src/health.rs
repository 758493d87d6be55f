//! Structured health reporting for dispatcher lifecycle events.

use std::sync::Arc;

use genbox_config::Config;
use genbox_plugins::CatalogError;

use crate::bootstrap::BootstrapError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
#[cfg_attr(test, mockall::automock)]
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the catalog pool is opened.
    fn catalog_connecting(&self);

    /// Invoked once the catalog pool is usable.
    fn catalog_ready(&self);

    /// Invoked when the catalog cannot be reached.
    fn catalog_failed(&self, error: &CatalogError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn catalog_connecting(&self) {
        (**self).catalog_connecting();
    }

    fn catalog_ready(&self) {
        (**self).catalog_ready();
    }

    fn catalog_failed(&self, error: &CatalogError) {
        (**self).catalog_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "genboxd::health",
            event = "bootstrap_starting",
            "starting dispatcher bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "genboxd::health",
            event = "bootstrap_succeeded",
            registry_domain = %config.registry_domain(),
            container_program = %config.container_program(),
            memory_limit_mib = config.memory_limit_mib(),
            cpu_millis = config.cpu_millis(),
            execution_timeout_secs = config.execution_timeout().as_secs(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "dispatcher bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "genboxd::health",
            event = "bootstrap_failed",
            error = %error,
            "dispatcher bootstrap failed"
        );
    }

    fn catalog_connecting(&self) {
        tracing::info!(
            target: "genboxd::health",
            event = "catalog_connecting",
            "connecting to plugin catalog"
        );
    }

    fn catalog_ready(&self) {
        tracing::info!(
            target: "genboxd::health",
            event = "catalog_ready",
            "plugin catalog ready"
        );
    }

    fn catalog_failed(&self, error: &CatalogError) {
        tracing::error!(
            target: "genboxd::health",
            event = "catalog_failed",
            error = %error,
            "plugin catalog unavailable"
        );
    }
}
