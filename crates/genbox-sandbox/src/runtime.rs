//! Execution environment providers.
//!
//! [`SandboxRuntime`] is the seam between the plugin executor and the
//! isolation technology. [`ContainerRuntime`] implements it by driving a
//! container engine CLI: one `run --rm` per call, stdin fed from the request,
//! stdout and stderr captured up to a byte limit, and forced teardown when
//! the caller's cancellation token fires or an exchange fails.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::ContainerCommand;
use crate::error::SandboxError;
use crate::profile::SandboxProfile;

/// Tracing target for sandbox runtime operations.
const RUNTIME_TARGET: &str = "genbox_sandbox::runtime";

/// Upper bound on the forced container removal after an interruption.
const REMOVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on each captured output stream, in mebibytes.
pub const DEFAULT_OUTPUT_LIMIT_MIB: u64 = 64;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Everything a finished sandboxed process produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SandboxOutput {
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl SandboxOutput {
    /// Creates an output record. `exit_code` is `None` when the process was
    /// terminated by a signal.
    #[must_use]
    pub const fn new(exit_code: Option<i32>, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Captured standard output.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Splits the record into `(exit_code, stdout, stderr)`.
    #[must_use]
    pub fn into_parts(self) -> (Option<i32>, Vec<u8>, Vec<u8>) {
        (self.exit_code, self.stdout, self.stderr)
    }
}

/// Runs one isolated process to completion.
///
/// Implementations must destroy the execution environment before returning,
/// whatever the outcome, and must return [`SandboxError::Interrupted`]
/// promptly once `cancel` fires, after terminating the process.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Runs `image` with `input` on standard input.
    ///
    /// # Errors
    ///
    /// Returns a [`SandboxError`] when the environment cannot be started,
    /// communication fails, or the run is interrupted. A non-zero exit is not
    /// an error at this level; it is reported through [`SandboxOutput`].
    async fn run(
        &self,
        image: &str,
        input: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError>;
}

/// Runtime backed by a Docker-compatible container engine CLI.
///
/// ```
/// use genbox_sandbox::{ContainerRuntime, SandboxProfile};
///
/// let runtime = ContainerRuntime::new("docker", SandboxProfile::new());
/// assert_eq!(runtime.program().to_str(), Some("docker"));
/// ```
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    program: PathBuf,
    profile: SandboxProfile,
    output_limit: usize,
}

impl ContainerRuntime {
    /// Creates a runtime that invokes `program` with `profile` applied to
    /// every execution and [`DEFAULT_OUTPUT_LIMIT_MIB`] as the output cap.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, profile: SandboxProfile) -> Self {
        Self {
            program: program.into(),
            profile,
            output_limit: mib_to_bytes(DEFAULT_OUTPUT_LIMIT_MIB),
        }
    }

    /// Caps stdout and stderr at `bytes` each. A run that writes more fails
    /// with [`SandboxError::OutputTooLarge`] and is torn down.
    #[must_use]
    pub const fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Same as [`Self::with_output_limit`], expressed in mebibytes.
    #[must_use]
    pub fn with_output_limit_mib(self, mib: u64) -> Self {
        self.with_output_limit(mib_to_bytes(mib))
    }

    /// Largest number of bytes captured from each output stream.
    #[must_use]
    pub const fn output_limit(&self) -> usize {
        self.output_limit
    }

    /// Engine program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Isolation profile applied to each run.
    #[must_use]
    pub const fn profile(&self) -> &SandboxProfile {
        &self.profile
    }

    fn spawn(&self, command: &ContainerCommand) -> Result<Child, SandboxError> {
        Command::new(command.program())
            .args(command.run_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: command.program().to_path_buf(),
                source: source.into(),
            })
    }

    async fn terminate(&self, child: &mut Child, command: &ContainerCommand) {
        if let Err(error) = child.start_kill() {
            debug!(
                target: RUNTIME_TARGET,
                container = command.name(),
                %error,
                "engine client already gone"
            );
        }
        if let Err(error) = child.wait().await {
            warn!(
                target: RUNTIME_TARGET,
                container = command.name(),
                %error,
                "failed to reap engine client"
            );
        }

        // Killing the client does not stop a running container.
        let removal = Command::new(command.program())
            .args(command.remove_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(REMOVAL_TIMEOUT, removal).await {
            Ok(Ok(status)) if status.success() => debug!(
                target: RUNTIME_TARGET,
                container = command.name(),
                "container removed"
            ),
            Ok(Ok(status)) => debug!(
                target: RUNTIME_TARGET,
                container = command.name(),
                ?status,
                "container removal reported failure; it may already be gone"
            ),
            Ok(Err(error)) => warn!(
                target: RUNTIME_TARGET,
                container = command.name(),
                %error,
                "failed to run container removal"
            ),
            Err(_) => warn!(
                target: RUNTIME_TARGET,
                container = command.name(),
                timeout_secs = REMOVAL_TIMEOUT.as_secs(),
                "container removal timed out"
            ),
        }
    }
}

#[async_trait]
impl SandboxRuntime for ContainerRuntime {
    async fn run(
        &self,
        image: &str,
        input: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError> {
        let command = ContainerCommand::new(&self.program, image, &self.profile)?;
        if cancel.is_cancelled() {
            return Err(SandboxError::Interrupted);
        }

        debug!(
            target: RUNTIME_TARGET,
            image,
            container = command.name(),
            request_bytes = input.len(),
            "starting sandbox"
        );

        let mut child = self.spawn(&command)?;
        let outcome = tokio::select! {
            result = exchange(&mut child, input, self.output_limit) => Some(result),
            () = cancel.cancelled() => None,
        };

        match outcome {
            Some(Ok(output)) => {
                debug!(
                    target: RUNTIME_TARGET,
                    container = command.name(),
                    exit_code = ?output.exit_code(),
                    stdout_bytes = output.stdout().len(),
                    stderr_bytes = output.stderr().len(),
                    "sandbox exited"
                );
                Ok(output)
            }
            Some(Err(error)) => {
                warn!(
                    target: RUNTIME_TARGET,
                    container = command.name(),
                    %error,
                    "sandbox exchange failed, terminating"
                );
                self.terminate(&mut child, &command).await;
                Err(error)
            }
            None => {
                warn!(
                    target: RUNTIME_TARGET,
                    container = command.name(),
                    "sandbox interrupted, terminating"
                );
                self.terminate(&mut child, &command).await;
                Err(SandboxError::Interrupted)
            }
        }
    }
}

/// Feeds stdin and drains both output pipes concurrently, then reaps the
/// child. The first failure abandons the other streams.
async fn exchange(
    child: &mut Child,
    input: Vec<u8>,
    limit: usize,
) -> Result<SandboxOutput, SandboxError> {
    let stdin = child
        .stdin
        .take()
        .ok_or(SandboxError::PipeUnavailable { stream: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(SandboxError::PipeUnavailable { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SandboxError::PipeUnavailable { stream: "stderr" })?;

    let ((), stdout_bytes, stderr_bytes) = tokio::try_join!(
        write_input(stdin, input),
        read_stream(stdout, "stdout", limit),
        read_stream(stderr, "stderr", limit)
    )?;

    let status = child.wait().await.map_err(SandboxError::io)?;
    Ok(SandboxOutput::new(status.code(), stdout_bytes, stderr_bytes))
}

/// Writes the whole request, then closes stdin by dropping it.
async fn write_input(mut stdin: ChildStdin, input: Vec<u8>) -> Result<(), SandboxError> {
    match stdin.write_all(&input).await {
        Ok(()) => {}
        // The process may legitimately exit without reading its input; its
        // exit status decides the outcome.
        Err(error) if error.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(target: RUNTIME_TARGET, "sandbox closed stdin early");
            return Ok(());
        }
        Err(error) => return Err(SandboxError::io(error)),
    }
    match stdin.shutdown().await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(error) => Err(SandboxError::io(error)),
    }
}

/// Reads `stream` to the end, failing once more than `limit` bytes arrive.
async fn read_stream(
    stream: impl AsyncRead + Unpin,
    name: &'static str,
    limit: usize,
) -> Result<Vec<u8>, SandboxError> {
    let ceiling = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut buffer = Vec::new();
    stream
        .take(ceiling)
        .read_to_end(&mut buffer)
        .await
        .map_err(SandboxError::io)?;
    if buffer.len() > limit {
        return Err(SandboxError::OutputTooLarge {
            stream: name,
            limit,
        });
    }
    Ok(buffer)
}

fn mib_to_bytes(mib: u64) -> usize {
    usize::try_from(mib.saturating_mul(BYTES_PER_MIB)).unwrap_or(usize::MAX)
}
