//! Crate-level tests for profiles, command construction and the container
//! runtime.

mod profile;
#[cfg(unix)]
mod support;
