//! Command-line front end for the genbox code-generation dispatcher.
//!
//! `genboxd` loads layered configuration through [`genbox_config`], installs
//! structured telemetry and then runs one subcommand:
//!
//! - `generate <IDENTIFIER>` resolves the plugin in the catalog, runs it in a
//!   sandbox with the request read from standard input (or `--input`) and
//!   writes the response to standard output (or `--output`). Ctrl-C cancels
//!   the call and tears the sandbox down.
//! - `check` verifies that the catalog is reachable.
//! - `migrate` applies the bundled catalog migration.
//!
//! Each bootstrap stage emits a health event through [`HealthReporter`] so
//! operators can tell which stage failed.

mod bootstrap;
mod cli;
mod commands;
mod health;
mod telemetry;

use std::ffi::OsString;
use std::fmt::Display;
use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Service, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use commands::CommandError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};

use crate::cli::{Cli, split_arguments};
use crate::commands::CONFIGURATION_EXIT;

/// Runs the dispatcher with explicit argument and stream handles.
///
/// The first element of `args` is the program name. Usage errors and
/// configuration failures exit with status 2; every other failure exits with
/// status 1 after writing a message (and any plugin diagnostics) to `stderr`.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: Read,
    W: Write,
    E: Write,
{
    let arguments: Vec<OsString> = args.into_iter().collect();
    let split = split_arguments(&arguments);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };

    let loader = SystemConfigLoader::new(split.config_arguments);
    let service = match bootstrap_with(&loader, Arc::new(StructuredHealthReporter::new())) {
        Ok(service) => service,
        Err(error) => {
            emit(stderr, &format_args!("genboxd: {error}"));
            return ExitCode::from(CONFIGURATION_EXIT);
        }
    };

    match commands::execute(&service, cli.command, stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error.report(stderr);
            error.exit_code()
        }
    }
}

fn report_usage<W: Write, E: Write>(error: &clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    let rendered = error.render().to_string();
    if error.use_stderr() {
        emit_bytes(stderr, rendered.as_bytes());
    } else {
        emit_bytes(stdout, rendered.as_bytes());
    }
    u8::try_from(error.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
}

/// Writes one line to a terminal stream, logging rather than failing.
pub(crate) fn emit<S: Write>(stream: &mut S, message: &dyn Display) {
    if let Err(error) = writeln!(stream, "{message}") {
        tracing::warn!(target: "genboxd", error = %error, "failed to write to terminal stream");
    }
}

/// Writes raw bytes to a terminal stream, logging rather than failing.
pub(crate) fn emit_bytes<S: Write>(stream: &mut S, bytes: &[u8]) {
    if let Err(error) = stream.write_all(bytes) {
        tracing::warn!(target: "genboxd", error = %error, "failed to write to terminal stream");
    }
}

#[cfg(test)]
mod tests;
