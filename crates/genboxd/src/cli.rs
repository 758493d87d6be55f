//! Command-line surface of the dispatcher.
//!
//! Configuration flags (`--database-url`, `--memory-limit-mib` and the rest
//! of [`genbox_config::Config`]) are consumed by `ortho_config` and must
//! appear before the subcommand. Everything from the subcommand onwards is
//! parsed by [`Cli`].

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Flags forwarded to the configuration loader.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--database-url",
    "--database-max-connections",
    "--registry-domain",
    "--container-program",
    "--memory-limit-mib",
    "--cpu-millis",
    "--output-limit-mib",
    "--execution-timeout-secs",
    "--log-filter",
    "--log-format",
];

/// Dispatches code-generation requests to sandboxed plugins.
#[derive(Parser, Debug)]
#[command(name = "genboxd", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Dispatcher operations.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Runs one plugin against a serialized `CodeGeneratorRequest`.
    Generate(GenerateArgs),
    /// Verifies that the plugin catalog is reachable.
    Check,
    /// Applies the bundled catalog migration.
    Migrate,
}

/// Arguments of `genboxd generate`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenerateArgs {
    /// Plugin identifier such as `gen-a`, `gen-a:v1` or `gen-a:latest`.
    #[arg(value_name = "IDENTIFIER")]
    pub(crate) identifier: String,
    /// Reads the request from this file instead of standard input.
    #[arg(long, value_name = "PATH")]
    pub(crate) input: Option<PathBuf>,
    /// Writes the response to this file instead of standard output.
    #[arg(long, value_name = "PATH")]
    pub(crate) output: Option<PathBuf>,
    /// Caller deadline for the whole call, in seconds.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout_secs: Option<u64>,
}

impl GenerateArgs {
    /// Caller deadline, when one was requested.
    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Command line divided between the configuration loader and [`Cli`].
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    /// Program name followed by configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the subcommand and its arguments.
    pub(crate) command_arguments: Vec<OsString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagArity {
    Inline,
    Separate,
}

impl FlagArity {
    fn of(argument: &OsStr) -> Option<Self> {
        let text = argument.to_str()?;
        let (flag, inline) = match text.split_once('=') {
            Some((flag, _)) => (flag, true),
            None => (text, false),
        };
        if !CONFIG_CLI_FLAGS.contains(&flag) {
            return None;
        }
        Some(if inline { Self::Inline } else { Self::Separate })
    }
}

/// Splits `args` at the first token that is not a configuration flag.
pub(crate) fn split_arguments(args: &[OsString]) -> ArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter().peekable();
    while let Some(arity) = remaining.peek().and_then(|argument| FlagArity::of(argument)) {
        config_arguments.extend(remaining.next().cloned());
        if arity == FlagArity::Separate {
            config_arguments.extend(remaining.next().cloned());
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(remaining.cloned());
    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
