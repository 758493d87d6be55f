//! Crate-level integration and BDD tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use genbox_sandbox::{SandboxError, SandboxOutput, SandboxRuntime};
use parking_lot::Mutex;
use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;
use prost_types::compiler::code_generator_response::File;
use tokio_util::sync::CancellationToken;

mod behaviour;

/// Encodes a `CodeGeneratorResponse` with the given error and files.
pub(crate) fn encoded_response(error: Option<&str>, files: &[(&str, &str)]) -> Vec<u8> {
    CodeGeneratorResponse {
        error: error.map(str::to_owned),
        file: files
            .iter()
            .map(|(name, content)| File {
                name: Some((*name).to_owned()),
                content: Some((*content).to_owned()),
                ..File::default()
            })
            .collect(),
        ..CodeGeneratorResponse::default()
    }
    .encode_to_vec()
}

/// A fixed instant offset by `offset_secs`.
pub(crate) fn at(offset_secs: i64) -> DateTime<Utc> {
    let epoch = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    epoch + Duration::seconds(offset_secs)
}

/// How a [`StubRuntime`] responds to a run.
pub(crate) enum StubBehaviour {
    Exit(SandboxOutput),
    Fail(SandboxError),
    HangUntilCancelled,
}

/// Sandbox runtime returning canned outcomes and recording its calls.
pub(crate) struct StubRuntime {
    behaviour: StubBehaviour,
    calls: AtomicUsize,
    torn_down: AtomicBool,
    last_run: Mutex<Option<(String, Vec<u8>)>>,
}

impl StubRuntime {
    pub(crate) fn new(behaviour: StubBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            torn_down: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    pub(crate) fn exiting(exit_code: Option<i32>, stdout: Vec<u8>, stderr: &[u8]) -> Self {
        Self::new(StubBehaviour::Exit(SandboxOutput::new(
            exit_code,
            stdout,
            stderr.to_vec(),
        )))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub(crate) fn last_run(&self) -> Option<(String, Vec<u8>)> {
        self.last_run.lock().clone()
    }
}

#[async_trait]
impl SandboxRuntime for StubRuntime {
    async fn run(
        &self,
        image: &str,
        input: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_run.lock() = Some((image.to_owned(), input));
        match &self.behaviour {
            StubBehaviour::Exit(output) => Ok(output.clone()),
            StubBehaviour::Fail(error) => Err(error.clone()),
            StubBehaviour::HangUntilCancelled => {
                cancel.cancelled().await;
                self.torn_down.store(true, Ordering::SeqCst);
                Err(SandboxError::Interrupted)
            }
        }
    }
}
