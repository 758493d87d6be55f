//! Unit tests for the generate orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rstest::{fixture, rstest};

use super::*;
use crate::catalog::{CatalogEntry, CatalogStore, MemoryCatalog};
use crate::error::{CatalogError, ErrorKind, ExecutionError};
use crate::metrics::{AttemptCounter, MetricsError, MockGenerationMetrics, NoMetrics};
use crate::tests::{at, encoded_response};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[fixture]
fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.register("gen-a:v1", at(0));
    catalog.register("gen-a:v2", at(60));
    catalog
}

fn output(error: Option<&str>, files: &[(&str, &str)], stderr: &[u8]) -> ExecutionOutput {
    let response =
        GeneratorResponse::decode(encoded_response(error, files)).expect("valid response");
    ExecutionOutput::new(response, stderr.to_vec())
}

fn generator<E: PluginExecutor>(
    catalog: MemoryCatalog,
    executor: E,
) -> Generator<MemoryCatalog, E> {
    Generator::new(
        catalog,
        RegistryDomain::new("registry.local"),
        executor,
        Arc::new(NoMetrics),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn latest_runs_the_newest_image_and_returns_its_bytes(catalog: MemoryCatalog) {
    let expected = encoded_response(None, &[("a.rs", "fn a() {}")]);
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .withf(|image, request, _| {
            image.as_str() == "registry.local/gen-a:v2" && request == b"request"
        })
        .times(1)
        .returning(|_, _, _| Ok(output(None, &[("a.rs", "fn a() {}")], b"")));

    let bytes = generator(catalog, executor)
        .generate("gen-a:latest", b"request", &CallContext::new())
        .await
        .expect("generated");
    assert_eq!(bytes, expected);
}

#[rstest]
#[tokio::test]
async fn exact_tag_runs_that_image(catalog: MemoryCatalog) {
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .withf(|image, _, _| image.as_str() == "registry.local/gen-a:v1")
        .times(1)
        .returning(|_, _, _| Ok(output(None, &[], b"")));

    let result = generator(catalog, executor)
        .generate("gen-a:v1", b"", &CallContext::new())
        .await;
    assert!(result.is_ok(), "unexpected failure: {result:?}");
}

#[rstest]
#[case::bare_name_with_only_tags("gen-a", ErrorKind::NotFound)]
#[case::unknown_tag("gen-a:v9", ErrorKind::NotFound)]
#[case::unknown_plugin("gen-z:latest", ErrorKind::NotFound)]
#[case::empty("", ErrorKind::InvalidIdentifier)]
#[case::two_separators("a:b:c", ErrorKind::InvalidIdentifier)]
#[tokio::test]
async fn unresolvable_identifiers_never_reach_the_executor(
    catalog: MemoryCatalog,
    #[case] identifier: &str,
    #[case] expected: ErrorKind,
) {
    let mut executor = MockPluginExecutor::new();
    executor.expect_execute().never();

    let error = generator(catalog, executor)
        .generate(identifier, b"request", &CallContext::new())
        .await
        .expect_err("resolution fails");
    assert_eq!(error.kind(), expected);
}

#[rstest]
#[tokio::test]
async fn reported_error_becomes_generation_failure(catalog: MemoryCatalog) {
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _, _| Ok(output(Some("unsupported option"), &[], b"hint\n")));

    let error = generator(catalog, executor)
        .generate("gen-a:v1", b"request", &CallContext::new())
        .await
        .expect_err("plugin reported failure");

    assert_eq!(error.kind(), ErrorKind::GenerationFailed);
    assert!(error.to_string().contains("unsupported option"));
    assert_eq!(error.diagnostics(), Some(&b"hint\n"[..]));
}

#[rstest]
#[tokio::test]
async fn empty_error_field_is_success(catalog: MemoryCatalog) {
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _, _| Ok(output(Some(""), &[("a.rs", "")], b"")));

    let result = generator(catalog, executor)
        .generate("gen-a:v1", b"request", &CallContext::new())
        .await;
    assert!(result.is_ok(), "unexpected failure: {result:?}");
}

#[rstest]
#[case::failed(
    || ExecutionError::Failed { image: "img".into(), exit_code: Some(3), stderr: b"boom\n".to_vec() },
    ErrorKind::GenerationFailed
)]
#[case::deadline(|| ExecutionError::DeadlineExceeded { image: "img".into() }, ErrorKind::DeadlineExceeded)]
#[case::canceled(|| ExecutionError::Canceled { image: "img".into() }, ErrorKind::Canceled)]
#[tokio::test]
async fn executor_failures_keep_their_kind(
    catalog: MemoryCatalog,
    #[case] failure: fn() -> ExecutionError,
    #[case] expected: ErrorKind,
) {
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .returning(move |_, _, _| Err(failure()));

    let error = generator(catalog, executor)
        .generate("gen-a:v1", b"request", &CallContext::new())
        .await
        .expect_err("executor failed");
    assert_eq!(error.kind(), expected);
}

#[rstest]
#[tokio::test]
async fn cancelled_call_is_abandoned_before_execution(catalog: MemoryCatalog) {
    let mut executor = MockPluginExecutor::new();
    executor.expect_execute().never();
    let context = CallContext::new();
    context.cancellation().cancel();

    let error = generator(catalog, executor)
        .generate("gen-a:v1", b"request", &context)
        .await
        .expect_err("cancelled");
    assert_eq!(error.kind(), ErrorKind::Canceled);
}

/// Catalog whose lookups never complete.
struct HangingCatalog;

#[async_trait]
impl CatalogStore for HangingCatalog {
    async fn latest_with_prefix(&self, _prefix: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        std::future::pending().await
    }

    async fn latest_named(&self, _name: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        std::future::pending().await
    }
}

#[rstest]
#[case::exact("gen-a:v1")]
#[case::latest("gen-a:latest")]
#[tokio::test]
async fn deadline_fires_while_the_catalog_hangs(#[case] identifier: &str) {
    let mut executor = MockPluginExecutor::new();
    executor.expect_execute().never();
    let generator = Generator::new(
        HangingCatalog,
        RegistryDomain::new("registry.local"),
        executor,
        Arc::new(NoMetrics),
    );

    let started = std::time::Instant::now();
    let error = generator
        .generate(
            identifier,
            b"request",
            &CallContext::new().with_timeout(Duration::from_millis(100)),
        )
        .await
        .expect_err("lookup outlives the deadline");

    assert_eq!(error.kind(), ErrorKind::DeadlineExceeded);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "deadline must interrupt the lookup, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn cancellation_interrupts_a_hanging_lookup() {
    let mut executor = MockPluginExecutor::new();
    executor.expect_execute().never();
    let generator = Generator::new(
        HangingCatalog,
        RegistryDomain::new("registry.local"),
        executor,
        Arc::new(NoMetrics),
    );
    let context = CallContext::new();
    let trigger = context.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let error = generator
        .generate("gen-a:v1", b"request", &context)
        .await
        .expect_err("cancelled during lookup");
    assert_eq!(error.kind(), ErrorKind::Canceled);
}

#[rstest]
#[tokio::test]
async fn every_call_records_exactly_one_attempt(catalog: MemoryCatalog) {
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _, _| Ok(output(None, &[], b"")));
    let counter = Arc::new(AttemptCounter::new());
    let generator = Generator::new(
        catalog,
        RegistryDomain::new("registry.local"),
        executor,
        counter.clone(),
    );

    let context = CallContext::new();
    generator
        .generate("gen-a:v1", b"", &context)
        .await
        .expect("generated");
    generator
        .generate("gen-missing", b"", &context)
        .await
        .expect_err("not found");
    generator
        .generate("", b"", &context)
        .await
        .expect_err("invalid");

    assert_eq!(counter.attempts("gen-a:v1"), 1);
    assert_eq!(counter.attempts("gen-missing"), 1);
    assert_eq!(counter.attempts(""), 1);
    assert_eq!(counter.total(), 3);
}

#[rstest]
#[tokio::test]
async fn metrics_failures_do_not_fail_the_call(catalog: MemoryCatalog) {
    let mut metrics = MockGenerationMetrics::new();
    metrics
        .expect_record_attempt()
        .times(1)
        .returning(|identifier| Err(MetricsError::new(identifier, "sink offline")));
    let mut executor = MockPluginExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _, _| Ok(output(None, &[], b"")));
    let generator = Generator::new(
        catalog,
        RegistryDomain::new("registry.local"),
        executor,
        Arc::new(metrics),
    );

    let result = generator
        .generate("gen-a:v1", b"", &CallContext::new())
        .await;
    assert!(result.is_ok(), "unexpected failure: {result:?}");
}

/// Executor that echoes the request back as the name of one generated file.
struct EchoExecutor;

#[async_trait]
impl PluginExecutor for EchoExecutor {
    async fn execute(
        &self,
        image: &ImageReference,
        request: &[u8],
        _context: &CallContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let name = format!("{image}/{}", String::from_utf8_lossy(request));
        Ok(output(None, &[(name.as_str(), "")], b""))
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_do_not_interfere(catalog: MemoryCatalog) {
    let generator = Arc::new(generator(catalog, EchoExecutor));

    let mut handles = Vec::new();
    for index in 0..16_u32 {
        let shared = Arc::clone(&generator);
        handles.push(tokio::spawn(async move {
            let request = index.to_string().into_bytes();
            let bytes = shared
                .generate("gen-a:v1", &request, &CallContext::new())
                .await
                .expect("generated");
            (index, bytes)
        }));
    }

    for handle in handles {
        let (index, bytes) = handle.await.expect("task completed");
        let response = GeneratorResponse::decode(bytes).expect("valid response");
        let expected = format!("registry.local/gen-a:v1/{index}");
        assert_eq!(response.file_names().collect::<Vec<_>>(), [expected.as_str()]);
    }
}

#[test]
fn accessors_expose_the_collaborators() {
    let generator = generator(MemoryCatalog::new(), EchoExecutor);
    assert_eq!(generator.resolver().domain().as_str(), "registry.local");
    assert!(generator.resolver().catalog().is_empty());
    let _: &EchoExecutor = generator.executor();
}
