//! Crate-level behaviour tests for the dispatcher front end.

mod support;
