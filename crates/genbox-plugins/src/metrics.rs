//! Observability sink for generation attempts.

use dashmap::DashMap;
use thiserror::Error;

/// A sink that could not record an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("metrics sink rejected the attempt for '{plugin}': {message}")]
pub struct MetricsError {
    plugin: String,
    message: String,
}

impl MetricsError {
    /// Creates an error for `plugin`.
    #[must_use]
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Receives one event per `generate` call, before any work is done.
///
/// Recording must not block; failures are logged by the caller and otherwise
/// ignored.
#[cfg_attr(test, mockall::automock)]
pub trait GenerationMetrics: Send + Sync {
    /// Records an attempt to run the plugin addressed by `identifier`.
    ///
    /// # Errors
    ///
    /// Returns a [`MetricsError`] when the sink cannot accept the event.
    fn record_attempt(&self, identifier: &str) -> Result<(), MetricsError>;
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl GenerationMetrics for NoMetrics {
    fn record_attempt(&self, _identifier: &str) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// In-process sink counting attempts per identifier.
#[derive(Debug, Default)]
pub struct AttemptCounter {
    attempts: DashMap<String, u64>,
}

impl AttemptCounter {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts recorded for `identifier`.
    #[must_use]
    pub fn attempts(&self, identifier: &str) -> u64 {
        self.attempts.get(identifier).map_or(0, |count| *count)
    }

    /// Attempts recorded across all identifiers.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.attempts.iter().map(|entry| *entry.value()).sum()
    }
}

impl GenerationMetrics for AttemptCounter {
    fn record_attempt(&self, identifier: &str) -> Result<(), MetricsError> {
        let mut count = self.attempts.entry(identifier.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(())
    }
}
