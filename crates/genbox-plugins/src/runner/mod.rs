//! Orchestration of resolution and sandboxed execution.
//!
//! The [`Generator`] is the public-facing API that transport adapters call. It
//! records the attempt, resolves the identifier through the [`Resolver`],
//! delegates to a [`PluginExecutor`] and classifies the outcome into a
//! [`GenerateError`] when anything goes wrong.
//!
//! The executor abstraction enables test doubles that return pre-configured
//! responses without starting containers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::CatalogStore;
use crate::context::{CallContext, Interrupt};
use crate::error::{ExecutionError, GenerateError};
use crate::metrics::GenerationMetrics;
use crate::protocol::GeneratorResponse;
use crate::resolver::{ImageReference, RegistryDomain, Resolver};

/// Tracing target for orchestration events.
const GENERATE_TARGET: &str = "genbox_plugins::generate";

/// What a successful plugin run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    response: GeneratorResponse,
    stderr: Vec<u8>,
}

impl ExecutionOutput {
    /// Pairs a decoded response with the diagnostics the plugin wrote.
    #[must_use]
    pub const fn new(response: GeneratorResponse, stderr: Vec<u8>) -> Self {
        Self { response, stderr }
    }

    /// The decoded response.
    #[must_use]
    pub const fn response(&self) -> &GeneratorResponse {
        &self.response
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Splits the output into its response and diagnostics.
    #[must_use]
    pub fn into_parts(self) -> (GeneratorResponse, Vec<u8>) {
        (self.response, self.stderr)
    }
}

/// Runs one plugin image against one request.
///
/// The production implementation is
/// [`SandboxExecutor`](crate::SandboxExecutor). Test code can
/// implement this trait to inject pre-configured outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PluginExecutor: Send + Sync {
    /// Runs `image` with `request` on standard input, honouring `context`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] when the plugin cannot be started, exits
    /// unsuccessfully, writes an undecodable response, or is interrupted.
    async fn execute(
        &self,
        image: &ImageReference,
        request: &[u8],
        context: &CallContext,
    ) -> Result<ExecutionOutput, ExecutionError>;
}

/// Composes a [`Resolver`] and a [`PluginExecutor`] behind `generate`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use chrono::Utc;
/// use genbox_plugins::{
///     CallContext, ExecutionError, ExecutionOutput, Generator, GeneratorResponse,
///     ImageReference, MemoryCatalog, NoMetrics, PluginExecutor, RegistryDomain,
/// };
///
/// struct EmptyExecutor;
///
/// #[async_trait]
/// impl PluginExecutor for EmptyExecutor {
///     async fn execute(
///         &self,
///         _image: &ImageReference,
///         _request: &[u8],
///         _context: &CallContext,
///     ) -> Result<ExecutionOutput, ExecutionError> {
///         let response = GeneratorResponse::decode(Vec::new()).expect("empty response");
///         Ok(ExecutionOutput::new(response, Vec::new()))
///     }
/// }
///
/// let catalog = MemoryCatalog::new();
/// catalog.register("gen-a:v1", Utc::now());
/// let generator = Generator::new(
///     catalog,
///     RegistryDomain::new("registry.local"),
///     EmptyExecutor,
///     Arc::new(NoMetrics),
/// );
///
/// let runtime = tokio::runtime::Builder::new_current_thread()
///     .enable_time()
///     .build()
///     .expect("runtime");
/// let bytes = runtime
///     .block_on(generator.generate("gen-a:latest", &[], &CallContext::new()))
///     .expect("generated");
/// assert!(bytes.is_empty());
/// ```
pub struct Generator<C, E> {
    resolver: Resolver<C>,
    executor: E,
    metrics: Arc<dyn GenerationMetrics>,
}

impl<C, E> Generator<C, E> {
    /// Creates a generator over `catalog`, building image references under
    /// `domain` and running them with `executor`.
    #[must_use]
    pub fn new(
        catalog: C,
        domain: RegistryDomain,
        executor: E,
        metrics: Arc<dyn GenerationMetrics>,
    ) -> Self {
        Self {
            resolver: Resolver::new(catalog, domain),
            executor,
            metrics,
        }
    }

    /// The resolver.
    #[must_use]
    pub const fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    /// The executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }
}

impl<C: CatalogStore, E: PluginExecutor> Generator<C, E> {
    /// Runs the plugin addressed by `identifier` on `request` and returns the
    /// plugin's encoded response.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateError`] classifying the first failure: a malformed
    /// identifier, no matching entry, an unsuccessful or undecodable run, or
    /// an interruption through `context`.
    pub async fn generate(
        &self,
        identifier: &str,
        request: &[u8],
        context: &CallContext,
    ) -> Result<Vec<u8>, GenerateError> {
        if let Err(error) = self.metrics.record_attempt(identifier) {
            warn!(target: GENERATE_TARGET, identifier, %error, "failed to record attempt");
        }
        debug!(
            target: GENERATE_TARGET,
            identifier,
            request_bytes = request.len(),
            "generate requested"
        );

        let started = Instant::now();
        let result = self.dispatch(identifier, request, context).await;
        match &result {
            Ok(bytes) => debug!(
                target: GENERATE_TARGET,
                identifier,
                response_bytes = bytes.len(),
                elapsed = ?started.elapsed(),
                "generate succeeded"
            ),
            Err(error) => warn!(
                target: GENERATE_TARGET,
                identifier,
                kind = error.kind().as_str(),
                elapsed = ?started.elapsed(),
                %error,
                "generate failed"
            ),
        }
        result
    }

    async fn dispatch(
        &self,
        identifier: &str,
        request: &[u8],
        context: &CallContext,
    ) -> Result<Vec<u8>, GenerateError> {
        let plugin = tokio::select! {
            biased;
            interrupt = context.interrupted() => return Err(interrupted(identifier, interrupt)),
            resolved = self.resolver.resolve(identifier) => resolved?,
        };

        let output = self
            .executor
            .execute(plugin.image(), request, context)
            .await
            .map_err(|error| GenerateError::from_execution(identifier, error))?;

        let (response, stderr) = output.into_parts();
        debug!(
            target: GENERATE_TARGET,
            identifier,
            image = %plugin.image(),
            files = response.file_count(),
            file_names = ?response.file_names().collect::<Vec<_>>(),
            "plugin executed"
        );
        if let Some(message) = response.error_message() {
            return Err(GenerateError::GenerationFailed {
                identifier: identifier.to_owned(),
                message: message.to_owned(),
                exit_code: Some(0),
                stderr,
            });
        }
        Ok(response.into_bytes())
    }
}

fn interrupted(requested: &str, interrupt: Interrupt) -> GenerateError {
    let identifier = requested.to_owned();
    match interrupt {
        Interrupt::DeadlineExceeded => GenerateError::DeadlineExceeded { identifier },
        Interrupt::Canceled => GenerateError::Canceled { identifier },
    }
}

#[cfg(test)]
mod tests;
