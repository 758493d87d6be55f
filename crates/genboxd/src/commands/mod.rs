//! Execution of the dispatcher subcommands after bootstrap.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use genbox_config::Config;
use genbox_plugins::{
    AttemptCounter, CallContext, CatalogError, CatalogStore, GenerateError, GenerationMetrics,
    Generator, PgCatalog, PluginExecutor, RegistryDomain, SandboxExecutor,
};
use genbox_sandbox::{ContainerRuntime, CpuLimit, MemoryLimit, SandboxProfile};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::Service;
use crate::cli::{Command, GenerateArgs};
use crate::health::HealthReporter;

/// Exit status for configuration and usage problems.
pub(crate) const CONFIGURATION_EXIT: u8 = 2;

/// Failures surfaced by a subcommand after bootstrap.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command needs the catalog but no connection string was given.
    #[error("database_url is not configured; set GENBOX_DATABASE_URL or pass --database-url")]
    MissingDatabaseUrl,
    /// The async runtime could not be created.
    #[error("failed to start the async runtime: {source}")]
    Runtime {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The request bytes could not be read.
    #[error("failed to read the request from {origin}: {source}")]
    ReadRequest {
        /// File path or `standard input`.
        origin: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The response bytes could not be written.
    #[error("failed to write the response to {destination}: {source}")]
    WriteResponse {
        /// File path or `standard output`.
        destination: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The catalog could not be reached or updated.
    #[error("plugin catalog unavailable: {source}")]
    Catalog {
        /// Underlying catalog error.
        #[source]
        source: CatalogError,
    },
    /// The generation call failed.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl CommandError {
    /// Process exit status for this failure.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::MissingDatabaseUrl => ExitCode::from(CONFIGURATION_EXIT),
            _ => ExitCode::FAILURE,
        }
    }

    /// Writes the failure, plus any plugin diagnostics, to `stderr`.
    pub(crate) fn report<E: Write>(&self, stderr: &mut E) {
        if let Self::Generate(failure) = self {
            let kind = failure.kind();
            tracing::error!(
                target: "genboxd::generate",
                kind = kind.as_str(),
                status = %kind.status_code(),
                error = %failure,
                "generation failed"
            );
            if let Some(diagnostics) = failure.diagnostics() {
                crate::emit_bytes(stderr, diagnostics);
            }
        }
        crate::emit(stderr, &format_args!("genboxd: {self}"));
    }
}

/// Runs `command` against a bootstrapped service.
pub(crate) fn execute<R, W>(
    service: &Service,
    command: Command,
    stdin: &mut R,
    stdout: &mut W,
) -> Result<(), CommandError>
where
    R: Read,
    W: Write,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| CommandError::Runtime {
            source: Arc::new(source),
        })?;

    match command {
        Command::Generate(args) => {
            let request = read_request(args.input.as_deref(), stdin)?;
            let response = runtime.block_on(generate(service, &args, &request))?;
            write_response(args.output.as_deref(), &response, stdout)
        }
        Command::Check => {
            runtime.block_on(check(service))?;
            crate::emit(stdout, &"catalog reachable");
            Ok(())
        }
        Command::Migrate => {
            runtime.block_on(migrate(service))?;
            crate::emit(stdout, &"catalog migrations applied");
            Ok(())
        }
    }
}

async fn connect(service: &Service) -> Result<PgCatalog, CommandError> {
    let config = service.config();
    let url = config
        .database_url()
        .ok_or(CommandError::MissingDatabaseUrl)?;
    let reporter = service.reporter();
    reporter.catalog_connecting();
    match PgCatalog::connect(url, config.database_max_connections()).await {
        Ok(catalog) => {
            reporter.catalog_ready();
            Ok(catalog)
        }
        Err(source) => {
            reporter.catalog_failed(&source);
            Err(CommandError::Catalog { source })
        }
    }
}

async fn check(service: &Service) -> Result<(), CommandError> {
    let catalog = connect(service).await?;
    let result = catalog.health().await;
    catalog.close().await;
    result.map_err(|source| catalog_failure(service.reporter(), source))
}

async fn migrate(service: &Service) -> Result<(), CommandError> {
    let catalog = connect(service).await?;
    let result = catalog.migrate().await;
    catalog.close().await;
    result.map_err(|source| catalog_failure(service.reporter(), source))
}

pub(crate) fn catalog_failure(reporter: &dyn HealthReporter, source: CatalogError) -> CommandError {
    reporter.catalog_failed(&source);
    CommandError::Catalog { source }
}

async fn generate(
    service: &Service,
    args: &GenerateArgs,
    request: &[u8],
) -> Result<Vec<u8>, CommandError> {
    let catalog = Arc::new(connect(service).await?);
    let attempts = Arc::new(AttemptCounter::new());
    let generator = build_generator(
        service.config(),
        Arc::clone(&catalog),
        Arc::clone(&attempts) as Arc<dyn GenerationMetrics>,
    );
    let result = run_generate(&generator, args, request).await;
    catalog.close().await;
    report_attempts(&attempts, &args.identifier);
    result
}

/// Wires the production generator from configuration.
pub(crate) fn build_generator<C: CatalogStore>(
    config: &Config,
    catalog: C,
    metrics: Arc<dyn GenerationMetrics>,
) -> Generator<C, SandboxExecutor<ContainerRuntime>> {
    let profile = SandboxProfile::new()
        .with_memory_limit(MemoryLimit::from_mib(config.memory_limit_mib()))
        .with_cpu_limit(CpuLimit::from_millis(config.cpu_millis()));
    let runtime = ContainerRuntime::new(config.container_program(), profile)
        .with_output_limit_mib(config.output_limit_mib());
    let executor = SandboxExecutor::new(runtime).with_timeout(config.execution_timeout());
    Generator::new(
        catalog,
        RegistryDomain::new(config.registry_domain()),
        executor,
        metrics,
    )
}

/// Logs the attempt counts gathered during this invocation.
pub(crate) fn report_attempts(attempts: &AttemptCounter, identifier: &str) {
    tracing::info!(
        target: "genboxd::metrics",
        identifier,
        attempts = attempts.attempts(identifier),
        total = attempts.total(),
        "generation attempts recorded"
    );
}

/// Runs one generation, cancelling it when the process is interrupted.
pub(crate) async fn run_generate<C, X>(
    generator: &Generator<C, X>,
    args: &GenerateArgs,
    request: &[u8],
) -> Result<Vec<u8>, CommandError>
where
    C: CatalogStore,
    X: PluginExecutor,
{
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));
    let context = call_context(args, cancel);
    let result = generator
        .generate(&args.identifier, request, &context)
        .await;
    watcher.abort();
    result.map_err(CommandError::from)
}

fn call_context(args: &GenerateArgs, cancel: CancellationToken) -> CallContext {
    let context = CallContext::new().with_cancellation(cancel);
    match args.timeout() {
        Some(timeout) => context.with_timeout(timeout),
        None => context,
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!(
            target: "genboxd::generate",
            "interrupt received; cancelling generation"
        );
        cancel.cancel();
    }
}

fn read_request<R: Read>(path: Option<&Path>, stdin: &mut R) -> Result<Vec<u8>, CommandError> {
    let read = match path {
        Some(file) => fs::read(file),
        None => {
            let mut buffer = Vec::new();
            stdin.read_to_end(&mut buffer).map(|_| buffer)
        }
    };
    read.map_err(|source| CommandError::ReadRequest {
        origin: describe(path, "standard input"),
        source: Arc::new(source),
    })
}

fn write_response<W: Write>(
    path: Option<&Path>,
    response: &[u8],
    stdout: &mut W,
) -> Result<(), CommandError> {
    let written = match path {
        Some(file) => fs::write(file, response),
        None => stdout.write_all(response).and_then(|()| stdout.flush()),
    };
    written.map_err(|source| CommandError::WriteResponse {
        destination: describe(path, "standard output"),
        source: Arc::new(source),
    })
}

fn describe(path: Option<&Path>, fallback: &str) -> String {
    path.map_or_else(|| fallback.to_owned(), |file| file.display().to_string())
}
