//! Domain errors raised while preparing or running a sandbox.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while preparing or launching a sandboxed process.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// The image reference cannot be passed safely to the container engine.
    #[error("image reference {image:?} is not acceptable: {reason}")]
    InvalidImage {
        /// Offending reference.
        image: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The container engine could not be started.
    #[error("failed to spawn sandbox program {program}: {source}")]
    Spawn {
        /// Engine program that was invoked.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A standard stream of the child was not captured.
    #[error("sandboxed process did not expose its {stream} pipe")]
    PipeUnavailable {
        /// Name of the missing stream.
        stream: &'static str,
    },

    /// Communicating with, or waiting for, the child failed.
    #[error("I/O error while talking to the sandboxed process: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The process wrote more than the runtime captures on one stream.
    #[error("sandboxed process wrote more than {limit} bytes to {stream}")]
    OutputTooLarge {
        /// Name of the offending stream.
        stream: &'static str,
        /// Cap that was exceeded, in bytes.
        limit: usize,
    },

    /// The run was interrupted through its cancellation token and the
    /// process was torn down.
    #[error("sandboxed process was interrupted and terminated")]
    Interrupted,
}

impl SandboxError {
    pub(crate) fn io(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}
