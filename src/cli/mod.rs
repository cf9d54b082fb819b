//! CLI support for sprig-lang
//!
//! Provides programmatic access to sprig CLI functionality for embedding
//! in other tools.

mod check;

pub use check::{CheckOptions, CheckResult, execute_check, execute_compile};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Any pipeline failure (YAML, grammar, resolution, schema, lowering)
    #[error("{0}")]
    Lang(#[from] crate::Error),

    /// Schema file failure
    #[error("schema error: {0}")]
    Schema(#[from] crate::SchemaError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No configuration provided
    #[error("no configuration provided; pass a file or pipe YAML to stdin")]
    NoInput,
}
