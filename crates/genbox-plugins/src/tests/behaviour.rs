//! Behaviour-driven tests for plugin generation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;

use super::encoded_response;
use crate::catalog::MemoryCatalog;
use crate::context::CallContext;
use crate::error::{ExecutionError, GenerateError};
use crate::metrics::NoMetrics;
use crate::protocol::GeneratorResponse;
use crate::resolver::{ImageReference, RegistryDomain};
use crate::runner::{ExecutionOutput, Generator, PluginExecutor};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
enum PluginBehaviour {
    #[default]
    Generates,
    ReportsError(String),
    Exits { status: i32, stderr: String },
}

#[derive(Clone, Default)]
struct PluginScript {
    behaviour: PluginBehaviour,
    file: String,
}

struct TestWorld {
    runtime: Runtime,
    catalog: Arc<MemoryCatalog>,
    script: PluginScript,
    runs: Arc<Mutex<Vec<String>>>,
    result: Option<Result<Vec<u8>, GenerateError>>,
}

#[fixture]
fn world() -> TestWorld {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime");
    TestWorld {
        runtime,
        catalog: Arc::new(MemoryCatalog::new()),
        script: PluginScript::default(),
        runs: Arc::default(),
        result: None,
    }
}

/// Executor that follows a [`PluginScript`] and records which images ran.
struct ScriptedExecutor {
    script: PluginScript,
    runs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PluginExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        image: &ImageReference,
        _request: &[u8],
        _context: &CallContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        self.runs.lock().push(image.to_string());
        let bytes = match &self.script.behaviour {
            PluginBehaviour::Generates => encoded_response(None, &[(self.script.file.as_str(), "")]),
            PluginBehaviour::ReportsError(message) => encoded_response(Some(message), &[]),
            PluginBehaviour::Exits { status, stderr } => {
                return Err(ExecutionError::Failed {
                    image: image.to_string(),
                    exit_code: Some(*status),
                    stderr: stderr.clone().into_bytes(),
                });
            }
        };
        let response = GeneratorResponse::decode(bytes).expect("scripted response decodes");
        Ok(ExecutionOutput::new(response, Vec::new()))
    }
}

/// Extracts the captured failure, panicking when the call succeeded.
fn failure(world: &TestWorld) -> &GenerateError {
    world
        .result
        .as_ref()
        .expect("no result captured")
        .as_ref()
        .expect_err("expected failure but got success")
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("the catalog contains {name} registered {minutes} minutes ago")]
fn given_catalog_entry(world: &mut TestWorld, name: String, minutes: i64) {
    let created_at = Utc::now() - Duration::minutes(minutes);
    world.catalog.register(name.trim_matches('"'), created_at);
}

#[given("a plugin that generates the file {file}")]
fn given_generating_plugin(world: &mut TestWorld, file: String) {
    world.script = PluginScript {
        behaviour: PluginBehaviour::Generates,
        file: file.trim_matches('"').to_owned(),
    };
}

#[given("a plugin that reports the error {message}")]
fn given_failing_plugin(world: &mut TestWorld, message: String) {
    world.script.behaviour = PluginBehaviour::ReportsError(message.trim_matches('"').to_owned());
}

#[given("a plugin that exits with status {status} and diagnostics {stderr}")]
fn given_crashing_plugin(world: &mut TestWorld, status: i32, stderr: String) {
    world.script.behaviour = PluginBehaviour::Exits {
        status,
        stderr: stderr.trim_matches('"').to_owned(),
    };
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("{identifier} is generated")]
fn when_generated(world: &mut TestWorld, identifier: String) {
    let executor = ScriptedExecutor {
        script: world.script.clone(),
        runs: Arc::clone(&world.runs),
    };
    let generator = Generator::new(
        Arc::clone(&world.catalog),
        RegistryDomain::new("registry.local/"),
        executor,
        Arc::new(NoMetrics),
    );
    let result = world.runtime.block_on(generator.generate(
        identifier.trim_matches('"'),
        b"request",
        &CallContext::new(),
    ));
    world.result = Some(result);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("generation succeeds with the file {file}")]
fn then_succeeds(world: &mut TestWorld, file: String) {
    let bytes = world
        .result
        .as_ref()
        .expect("no result captured")
        .as_ref()
        .expect("expected success");
    let response = GeneratorResponse::decode(bytes.clone()).expect("returned bytes decode");
    let expected = file.trim_matches('"');
    assert_eq!(response.file_names().collect::<Vec<_>>(), [expected]);
}

#[then("the plugin image {image} was run")]
fn then_image_ran(world: &mut TestWorld, image: String) {
    let expected = image.trim_matches('"');
    assert_eq!(world.runs.lock().as_slice(), [expected.to_owned()]);
}

#[then("no plugin was run")]
fn then_nothing_ran(world: &mut TestWorld) {
    assert!(world.runs.lock().is_empty());
}

#[then("generation fails with kind {kind}")]
fn then_fails_with(world: &mut TestWorld, kind: String) {
    let error = failure(world);
    assert_eq!(error.kind().as_str(), kind.trim_matches('"'), "error: {error}");
}

#[then("the failure message mentions {text}")]
fn then_message_mentions(world: &mut TestWorld, text: String) {
    let message = failure(world).to_string();
    let expected = text.trim_matches('"');
    assert!(message.contains(expected), "message was: {message}");
}

#[then("the failure diagnostics are {text}")]
fn then_diagnostics(world: &mut TestWorld, text: String) {
    let diagnostics = failure(world).diagnostics().expect("diagnostics captured");
    assert_eq!(diagnostics, text.trim_matches('"').as_bytes());
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/plugin_generation.feature")]
fn plugin_generation_behaviour(world: TestWorld) {
    let _ = world;
}
