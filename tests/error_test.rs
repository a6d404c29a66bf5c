//! Tests for error types

use std::error::Error as _;
use std::path::PathBuf;

use sweep_bench::token::TokenError;
use sweep_bench::Error;

#[test]
fn test_protocol_error() {
    let error = Error::Protocol {
        program: "./first".to_string(),
        source: TokenError::MissingDelimiter,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Protocol violation"));
    assert!(error_str.contains("./first"));
    assert!(error_str.contains("delimiter"));
    assert!(error.source().is_some());
}

#[test]
fn test_invalid_elapsed_error() {
    let error = Error::Protocol {
        program: "./third".to_string(),
        source: TokenError::InvalidElapsed("abc".to_string()),
    };
    assert!(format!("{error}").contains("\"abc\""));
}

#[test]
fn test_launch_error() {
    let error = Error::Launch {
        program: "mpiexec".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Failed to launch mpiexec"));
    assert!(error_str.contains("not found"));
}

#[test]
fn test_join_error() {
    let error = Error::Join {
        key: "points_number=100".to_string(),
        matches: 0,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Join error"));
    assert!(error_str.contains("0 baseline rows"));
    assert!(error_str.contains("points_number=100"));
}

#[test]
fn test_malformed_row_error() {
    let error = Error::MalformedRow {
        line: 7,
        reason: "expected 4 fields, found 3".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("line 7"));
    assert!(error_str.contains("expected 4 fields"));
}

#[cfg(unix)]
#[test]
fn test_build_failure_error() {
    use std::os::unix::process::ExitStatusExt;

    let error = Error::BuildFailure {
        source_file: PathBuf::from("lab/first.c"),
        status: std::process::ExitStatus::from_raw(256),
        stderr: "first.c:3: error: expected ';'".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Build of lab/first.c failed"));
    assert!(error_str.contains("expected ';'"));
}

#[test]
fn test_schema_error() {
    let error = Error::Schema("table header [a,b] does not match".to_string());
    assert!(format!("{error}").contains("Schema error"));
}

#[test]
fn test_unknown_experiment_error() {
    let error = Error::UnknownExperiment("fourth.c".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Unknown experiment: fourth.c"));
    assert!(error_str.contains("first, second or third"));
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("retries must be at least 1".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("retries"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "stats.csv");
    let error: Error = io_error.into();
    assert!(matches!(error, Error::Io(_)));
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Other("debug test".to_string());
    assert!(format!("{error:?}").contains("Other"));
}
