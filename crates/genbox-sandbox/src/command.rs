//! Translation of a [`SandboxProfile`] into container engine arguments.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::SandboxError;
use crate::profile::SandboxProfile;

/// Prefix of every container name created by the runtime.
pub const CONTAINER_NAME_PREFIX: &str = "genbox-";

/// A fully prepared `run` invocation for one sandboxed execution.
///
/// Each command carries a unique container name so the runtime can force
/// removal of the container when an execution is interrupted, even after the
/// engine client process has been killed.
///
/// ```
/// use genbox_sandbox::{ContainerCommand, SandboxProfile};
///
/// let command = ContainerCommand::new("docker", "registry.local/gen-a:v1", &SandboxProfile::new())
///     .expect("valid image");
/// let args: Vec<String> = command
///     .run_args()
///     .iter()
///     .map(|arg| arg.to_string_lossy().into_owned())
///     .collect();
/// assert!(args.contains(&"--network=none".to_owned()));
/// assert_eq!(args.last().map(String::as_str), Some("registry.local/gen-a:v1"));
/// ```
#[derive(Debug, Clone)]
pub struct ContainerCommand {
    program: PathBuf,
    name: String,
    image: String,
    args: Vec<OsString>,
}

impl ContainerCommand {
    /// Prepares a `run` invocation of `image` under `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidImage`] when the image reference is
    /// empty, contains whitespace or control characters, or starts with `-`
    /// and would therefore be parsed as an engine flag.
    pub fn new(
        program: impl Into<PathBuf>,
        image: &str,
        profile: &SandboxProfile,
    ) -> Result<Self, SandboxError> {
        validate_image(image)?;
        let name = format!("{CONTAINER_NAME_PREFIX}{}", Uuid::new_v4().simple());
        let args = build_run_args(&name, image, profile);
        Ok(Self {
            program: program.into(),
            name,
            image: image.to_owned(),
            args,
        })
    }

    /// Engine program to execute.
    #[must_use]
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Unique container name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Image reference being run.
    #[must_use]
    pub fn image(&self) -> &str {
        self.image.as_str()
    }

    /// Arguments passed to the engine program for the run.
    #[must_use]
    pub fn run_args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments that force-remove the container after an interruption.
    #[must_use]
    pub fn remove_args(&self) -> [OsString; 3] {
        [
            OsString::from("rm"),
            OsString::from("--force"),
            OsString::from(&self.name),
        ]
    }
}

fn build_run_args(name: &str, image: &str, profile: &SandboxProfile) -> Vec<OsString> {
    let memory = profile.memory_limit().as_flag_value();
    vec![
        "run".into(),
        "--rm".into(),
        // Keep stdin attached; never allocate a TTY.
        "--interactive".into(),
        "--name".into(),
        name.into(),
        format!("--memory={memory}").into(),
        format!("--memory-swap={memory}").into(),
        format!("--cpus={}", profile.cpu_limit().as_flag_value()).into(),
        "--cap-drop=ALL".into(),
        "--security-opt=no-new-privileges".into(),
        "--network=none".into(),
        image.into(),
    ]
}

fn validate_image(image: &str) -> Result<(), SandboxError> {
    let reject = |reason| {
        Err(SandboxError::InvalidImage {
            image: image.to_owned(),
            reason,
        })
    };

    if image.is_empty() {
        return reject("image reference is empty");
    }
    if image.starts_with('-') {
        return reject("image reference must not start with '-'");
    }
    if image
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return reject("image reference must not contain whitespace or control characters");
    }
    Ok(())
}
