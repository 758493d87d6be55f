//! Sandboxed plugin execution.
//!
//! [`SandboxExecutor`] implements the [`PluginExecutor`] trait on top of a
//! [`SandboxRuntime`]: it forwards the request bytes to the sandbox, bounds the
//! run by the caller's deadline and its own timeout, and classifies what the
//! plugin left behind. The exit status is inspected before the output is
//! decoded, so a crashing plugin is reported as a failed run even when it
//! also wrote garbage to standard output.

use std::time::Duration;

use async_trait::async_trait;
use genbox_sandbox::{SandboxError, SandboxRuntime};
use tracing::{debug, warn};

use crate::context::{CallContext, Interrupt};
use crate::error::ExecutionError;
use crate::protocol::GeneratorResponse;
use crate::resolver::ImageReference;
use crate::runner::{ExecutionOutput, PluginExecutor};

/// Tracing target for plugin process operations.
const PROCESS_TARGET: &str = "genbox_plugins::process";

/// Upper bound on a single plugin run unless configured otherwise.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes plugins inside sandboxes provided by a [`SandboxRuntime`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use genbox_plugins::SandboxExecutor;
/// use genbox_sandbox::{ContainerRuntime, SandboxProfile};
///
/// let runtime = ContainerRuntime::new("docker", SandboxProfile::new());
/// let executor = SandboxExecutor::new(runtime).with_timeout(Duration::from_secs(10));
/// assert_eq!(executor.timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct SandboxExecutor<R> {
    runtime: R,
    timeout: Duration,
}

impl<R> SandboxExecutor<R> {
    /// Creates an executor over `runtime` with [`DEFAULT_EXECUTION_TIMEOUT`].
    #[must_use]
    pub const fn new(runtime: R) -> Self {
        Self {
            runtime,
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    /// Replaces the per-run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-run timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The sandbox runtime.
    #[must_use]
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }
}

#[async_trait]
impl<R: SandboxRuntime> PluginExecutor for SandboxExecutor<R> {
    async fn execute(
        &self,
        image: &ImageReference,
        request: &[u8],
        context: &CallContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let bounded = context.tightened(self.timeout);
        if let Some(interrupt) = bounded.interruption() {
            return Err(interrupted(image, interrupt));
        }

        let cancel = bounded.cancellation();
        let mut run = self.runtime.run(image.as_str(), request.to_vec(), cancel);
        let outcome = tokio::select! {
            biased;
            result = &mut run => result,
            interrupt = bounded.interrupted() => {
                cancel.cancel();
                // The runtime tears the sandbox down before resolving.
                if let Err(error) = run.await {
                    debug!(target: PROCESS_TARGET, image = image.as_str(), %error, "sandbox stopped");
                }
                warn!(
                    target: PROCESS_TARGET,
                    image = image.as_str(),
                    reason = ?interrupt,
                    "plugin run interrupted"
                );
                return Err(interrupted(image, interrupt));
            }
        };

        let output = outcome.map_err(|error| match error {
            SandboxError::Interrupted => {
                interrupted(image, bounded.interruption().unwrap_or(Interrupt::Canceled))
            }
            source => ExecutionError::Sandbox {
                image: image.to_string(),
                source,
            },
        })?;

        let (exit_code, stdout, stderr) = output.into_parts();
        if exit_code != Some(0) {
            debug!(
                target: PROCESS_TARGET,
                image = image.as_str(),
                ?exit_code,
                stderr_bytes = stderr.len(),
                "plugin exited unsuccessfully"
            );
            return Err(ExecutionError::Failed {
                image: image.to_string(),
                exit_code,
                stderr,
            });
        }

        let response =
            GeneratorResponse::decode(stdout).map_err(|source| ExecutionError::Protocol {
                image: image.to_string(),
                source,
            })?;
        debug!(
            target: PROCESS_TARGET,
            image = image.as_str(),
            files = response.file_count(),
            "plugin response decoded"
        );
        Ok(ExecutionOutput::new(response, stderr))
    }
}

fn interrupted(image: &ImageReference, interrupt: Interrupt) -> ExecutionError {
    let name = image.to_string();
    match interrupt {
        Interrupt::DeadlineExceeded => ExecutionError::DeadlineExceeded { image: name },
        Interrupt::Canceled => ExecutionError::Canceled { image: name },
    }
}
