//! Error types for sweep-bench
//!
//! Every fatal condition of a sweep maps to one variant here. The only
//! non-fatal path is the lenient row policy of the table reader, which logs
//! and skips instead of returning [`Error::MalformedRow`].

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::token::TokenError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// sweep-bench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Timing token missing or malformed in a program's output
    #[error("Protocol violation from {program}: {source}")]
    Protocol {
        /// Program whose output was rejected
        program: String,
        /// Underlying token parse failure
        #[source]
        source: TokenError,
    },

    /// Child process could not be spawned
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start
        program: String,
        /// OS-level cause
        #[source]
        source: std::io::Error,
    },

    /// Child exited unsuccessfully without emitting a timing token
    #[error("{program} exited with {status} and no timing token\nstderr: {stderr}")]
    ProgramFailed {
        /// Program that failed
        program: String,
        /// Exit status of the child
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// Build collaborator reported a non-zero status
    #[error("Build of {} failed with {status}\n{stderr}", source_file.display())]
    BuildFailure {
        /// Source file handed to the compiler
        source_file: PathBuf,
        /// Compiler exit status
        status: ExitStatus,
        /// Compiler diagnostics
        stderr: String,
    },

    /// Baseline row missing or duplicated for a join key
    #[error("Join error: {matches} baseline rows for key [{key}] (expected exactly 1)")]
    Join {
        /// Rendered join-key values
        key: String,
        /// Number of baseline rows that matched
        matches: usize,
    },

    /// Persisted row with too few fields or a non-numeric field
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow {
        /// 1-based line number in the table file
        line: u64,
        /// What was wrong with it
        reason: String,
    },

    /// Table header or descriptor schema is inconsistent
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid argument or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No built-in experiment matches the request
    #[error("Unknown experiment: {0}\nExpected a name or filename containing first, second or third")]
    UnknownExperiment(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
