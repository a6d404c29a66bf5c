//! Building and launching from the working directory
//!
//! Kept in its own test binary: it changes the process working directory,
//! which would race with tests running on other threads.

#![cfg(unix)]

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sweep_bench::build::{Prebuilt, Toolchain};
use sweep_bench::runner::{Invocation, Launcher, Measurement, ProcessExecutor, TrialRunner};
use sweep_bench::Result;

/// Resolve `first.c` to its prebuilt executable and time it twice.
fn measure_first() -> Result<Measurement> {
    let program = Prebuilt.build(Path::new("first.c"))?;
    assert_eq!(program, PathBuf::from("./first"));

    let runner =
        TrialRunner::new(ProcessExecutor::new(Launcher::openmp()), 2)?.with_pause(Duration::ZERO);
    runner.measure(&Invocation {
        program,
        concurrency: 2,
        args: vec!["1000".to_string()],
    })
}

#[test]
fn test_bare_source_name_runs_through_direct_launcher() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("first");
    fs::write(&script, "#!/bin/sh\necho \"|3.14,$1,0.5|\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();

    let outcome = measure_first();

    env::set_current_dir(previous).unwrap();

    let m = outcome.unwrap();
    assert_eq!(m.metadata, ["3.14", "1000"]);
    assert_eq!(m.mean_time, 0.5);
}
