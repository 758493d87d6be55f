//! Plugin resolution and sandboxed execution for the genbox dispatcher.
//!
//! A caller names a code-generation plugin with an identifier such as
//! `gen-a`, `gen-a:v1` or `gen-a:latest` and supplies a serialized
//! `CodeGeneratorRequest`. This crate resolves the identifier against the
//! plugin catalog, runs the matching container image in a resource-bounded
//! sandbox with the request on standard input, and returns the plugin's
//! serialized `CodeGeneratorResponse`.
//!
//! # Architecture
//!
//! - [`Identifier`] parses the identifier grammar into one [`CatalogQuery`].
//! - [`CatalogStore`] is the read contract over the catalog, implemented by
//!   [`PgCatalog`] and [`MemoryCatalog`].
//! - [`Resolver`] performs the lookup and builds the [`ImageReference`].
//! - [`PluginExecutor`] runs an image; [`SandboxExecutor`] does so through a
//!   `genbox_sandbox::SandboxRuntime`.
//! - [`Generator`] composes the pieces behind `generate`, reporting every
//!   failure as a [`GenerateError`] with a stable [`ErrorKind`].
//!
//! Every call is bounded by a [`CallContext`] carrying an optional deadline
//! and a cancellation token; interrupting a call terminates its sandbox.

mod catalog;
mod context;
mod error;
mod identifier;
mod metrics;
mod process;
mod protocol;
mod resolver;
mod runner;

#[cfg(test)]
mod tests;

pub use self::catalog::{CatalogEntry, CatalogStore, MemoryCatalog, PgCatalog};
pub use self::context::{CallContext, Interrupt};
pub use self::error::{
    CatalogError, ErrorKind, ExecutionError, GenerateError, IdentifierError, ResolveError,
    StatusCode,
};
pub use self::identifier::{CatalogQuery, Identifier, LATEST_TAG, TAG_SEPARATOR};
pub use self::metrics::{AttemptCounter, GenerationMetrics, MetricsError, NoMetrics};
pub use self::process::{DEFAULT_EXECUTION_TIMEOUT, SandboxExecutor};
pub use self::protocol::GeneratorResponse;
pub use self::resolver::{ImageReference, RegistryDomain, ResolvedPlugin, Resolver};
pub use self::runner::{ExecutionOutput, Generator, PluginExecutor};
