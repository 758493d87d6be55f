//! Isolation for untrusted code-generation plugins.
//!
//! The `genbox-sandbox` crate turns a [`SandboxProfile`] into a container
//! engine invocation and runs it through the [`SandboxRuntime`] capability.
//! Every execution gets a fresh, uniquely named container that is removed
//! when the process exits or when the caller cancels.
//!
//! Isolation is fixed; only the resource limits are tunable:
//! - Networking is disabled and no environment variables are forwarded.
//! - Memory is capped (swap included) and CPU never exceeds one core.
//! - Each stream read back from the plugin is capped in size.
//! - All Linux capabilities are dropped and privilege escalation is blocked.
//! - No TTY is allocated; the process sees stdin, stdout and stderr only.
//!
//! ```rust,no_run
//! use genbox_sandbox::{ContainerRuntime, SandboxProfile, SandboxRuntime};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), genbox_sandbox::SandboxError> {
//! let runtime = ContainerRuntime::new("docker", SandboxProfile::new());
//! let output = runtime
//!     .run("registry.local/protoc-gen-go:v1.34.0", Vec::new(), &CancellationToken::new())
//!     .await?;
//! assert!(output.success());
//! # Ok(()) }
//! ```

mod command;
mod error;
mod profile;
mod runtime;

pub use command::{CONTAINER_NAME_PREFIX, ContainerCommand};
pub use error::SandboxError;
pub use profile::{
    CpuLimit, DEFAULT_CPU_MILLIS, DEFAULT_MEMORY_MIB, MAX_CPU_MILLIS, MemoryLimit, SandboxProfile,
};
pub use runtime::{ContainerRuntime, DEFAULT_OUTPUT_LIMIT_MIB, SandboxOutput, SandboxRuntime};

#[cfg(test)]
mod tests;
