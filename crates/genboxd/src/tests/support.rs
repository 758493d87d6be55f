//! Test harness utilities for the bootstrap behaviour suite.

use std::ffi::OsString;
use std::sync::{Arc, Mutex};

use genbox_config::Config;
use genbox_plugins::CatalogError;
use ortho_config::{OrthoConfig, OrthoError};

use crate::bootstrap::{BootstrapError, ConfigLoader, Service, StaticConfigLoader, bootstrap_with};
use crate::health::HealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    service: Option<Service>,
    bootstrap_error: Option<BootstrapError>,
}

impl TestWorld {
    /// Builds a world whose loader returns the default configuration.
    pub fn new() -> Self {
        Self {
            loader: Box::new(StaticConfigLoader::new(Config::default())),
            reporter: Arc::new(RecordingHealthReporter::default()),
            service: None,
            bootstrap_error: None,
        }
    }

    /// Installs a loader returning `config`.
    pub fn use_config(&mut self, config: Config) {
        self.loader = Box::new(StaticConfigLoader::new(config));
    }

    /// Installs a loader that always fails to parse its flags.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        let reporter: Arc<dyn HealthReporter> = self.reporter.clone();
        match bootstrap_with(&*self.loader, reporter) {
            Ok(service) => self.service = Some(service),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns the bootstrap error, if any.
    pub const fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the bootstrapped service, if any.
    pub const fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }
}

/// Loader that fails by passing a malformed flag value.
struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("genboxd"),
            OsString::from("--memory-limit-mib"),
            OsString::from("plenty"),
        ])
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn catalog_connecting(&self) {
        self.record(HealthEvent::CatalogConnecting);
    }

    fn catalog_ready(&self) {
        self.record(HealthEvent::CatalogReady);
    }

    fn catalog_failed(&self, error: &CatalogError) {
        self.record(HealthEvent::CatalogFailed(error.to_string()));
    }
}

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    CatalogConnecting,
    CatalogReady,
    CatalogFailed(String),
}
