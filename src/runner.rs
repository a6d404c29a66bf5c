//! Trial runner
//!
//! Runs one grid point's program `retries` times in sequence, parses the
//! timing token of every run, and averages the elapsed times. A failure on
//! any run aborts the trial; failed runs are never excluded from the mean.
//!
//! The mean is kept incrementally, so identical elapsed values average to
//! exactly that value for any number of runs.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::experiment::{ExperimentDescriptor, GridPoint, TrialResult};
use crate::token::TimingToken;
use crate::{Error, Result};

/// Default pause between consecutive runs of a trial
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(100);

/// One concrete program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable under test
    pub program: PathBuf,
    /// Process or thread count
    pub concurrency: u32,
    /// Positional arguments after the executable
    pub args: Vec<String>,
}

impl Invocation {
    /// Display name used in logs and errors.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Runs an invocation to completion and returns its standard output.
///
/// Closures `Fn(&Invocation) -> Result<String>` implement this, which is how
/// tests substitute a mock program.
pub trait Executor {
    /// Run once, blocking until the child exits.
    ///
    /// # Errors
    ///
    /// Returns `Error::Launch` if the child cannot start or
    /// `Error::ProgramFailed` if it exits unsuccessfully without a token.
    fn execute(&self, invocation: &Invocation) -> Result<String>;
}

impl<F> Executor for F
where
    F: Fn(&Invocation) -> Result<String>,
{
    fn execute(&self, invocation: &Invocation) -> Result<String> {
        self(invocation)
    }
}

/// How the program under test is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Launcher {
    /// `<program> <concurrency_flag> N <executable> args...`
    Mpi {
        /// Launcher program, usually `mpiexec`
        program: String,
        /// Flag preceding the process count, usually `-n`
        concurrency_flag: String,
    },
    /// `<executable> args...` with the count exported in `env_var`
    Direct {
        /// Environment variable carrying the thread count
        env_var: String,
    },
}

impl Default for Launcher {
    fn default() -> Self {
        Self::Mpi {
            program: "mpiexec".to_string(),
            concurrency_flag: "-n".to_string(),
        }
    }
}

impl Launcher {
    /// Direct launch exporting `OMP_NUM_THREADS`.
    #[must_use]
    pub fn openmp() -> Self {
        Self::Direct {
            env_var: "OMP_NUM_THREADS".to_string(),
        }
    }

    /// Command for an invocation, not yet spawned.
    #[must_use]
    pub fn command(&self, invocation: &Invocation) -> Command {
        match self {
            Self::Mpi {
                program,
                concurrency_flag,
            } => {
                let mut cmd = Command::new(program);
                cmd.arg(concurrency_flag)
                    .arg(invocation.concurrency.to_string())
                    .arg(&invocation.program)
                    .args(&invocation.args);
                cmd
            }
            Self::Direct { env_var } => {
                let mut cmd = Command::new(&invocation.program);
                cmd.args(&invocation.args)
                    .env(env_var, invocation.concurrency.to_string());
                cmd
            }
        }
    }

    fn program_name(&self, invocation: &Invocation) -> String {
        match self {
            Self::Mpi { program, .. } => program.clone(),
            Self::Direct { .. } => invocation.program_name(),
        }
    }
}

/// Spawns real child processes through a [`Launcher`].
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    launcher: Launcher,
}

impl ProcessExecutor {
    /// Executor using the given launcher.
    #[must_use]
    pub const fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }

    /// The launcher in use.
    #[must_use]
    pub const fn launcher(&self) -> &Launcher {
        &self.launcher
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<String> {
        let output = self
            .launcher
            .command(invocation)
            .output()
            .map_err(|err| Error::Launch {
                program: self.launcher.program_name(invocation),
                source: err,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            // the token is the contract: a run that printed one still counts
            if TimingToken::parse(&stdout).is_err() {
                return Err(Error::ProgramFailed {
                    program: invocation.program_name(),
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
            warn!(
                program = %invocation.program_name(),
                status = %output.status,
                "non-zero exit with a valid timing token"
            );
        }

        Ok(stdout)
    }
}

/// Averaged outcome of one trial, before it is attached to a grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Metadata of the final run
    pub metadata: Vec<String>,
    /// Mean elapsed seconds over all runs
    pub mean_time: f64,
    /// Number of runs averaged
    pub samples: u32,
}

/// Repeats an invocation and averages its timing tokens.
#[derive(Debug, Clone)]
pub struct TrialRunner<E> {
    executor: E,
    retries: u32,
    pause: Duration,
}

impl<E: Executor> TrialRunner<E> {
    /// Runner with the default pause between runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `retries` is zero.
    pub fn new(executor: E, retries: u32) -> Result<Self> {
        if retries == 0 {
            return Err(Error::InvalidInput("retries must be at least 1".to_string()));
        }
        Ok(Self {
            executor,
            retries,
            pause: DEFAULT_PAUSE,
        })
    }

    /// Set the pause between consecutive runs.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Runs per trial.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Run `invocation` `retries` times and average the elapsed times.
    ///
    /// # Errors
    ///
    /// Returns the first launch failure or `Error::Protocol` for the first
    /// run whose output carries no valid token.
    pub fn measure(&self, invocation: &Invocation) -> Result<Measurement> {
        let mut mean = 0.0;
        let mut metadata: Option<Vec<String>> = None;

        for run in 0..self.retries {
            if run > 0 && !self.pause.is_zero() {
                thread::sleep(self.pause);
            }

            let stdout = self.executor.execute(invocation)?;
            let token = TimingToken::parse(&stdout).map_err(|source| Error::Protocol {
                program: invocation.program_name(),
                source,
            })?;
            debug!(
                program = %invocation.program_name(),
                concurrency = invocation.concurrency,
                run,
                token = %format!("{},{}", token.metadata_csv(), token.elapsed()),
            );

            mean += (token.elapsed() - mean) / f64::from(run + 1);
            let current = token.into_metadata();
            if let Some(previous) = &metadata {
                if *previous != current {
                    warn!(
                        program = %invocation.program_name(),
                        previous = %previous.join(","),
                        current = %current.join(","),
                        "metadata differs between runs, keeping the latest"
                    );
                }
            }
            metadata = Some(current);
        }

        Ok(Measurement {
            metadata: metadata.unwrap_or_default(),
            mean_time: mean,
            samples: self.retries,
        })
    }

    /// Measure one grid point of an experiment.
    ///
    /// # Errors
    ///
    /// Propagates invocation-template and measurement errors.
    pub fn run_trial(
        &self,
        descriptor: &ExperimentDescriptor,
        point: &GridPoint,
        program: &Path,
    ) -> Result<TrialResult> {
        let invocation = descriptor.invocation(point, program)?;
        let measurement = self.measure(&invocation)?;
        info!(
            experiment = descriptor.name(),
            point = %point,
            payload = %measurement.metadata.join(","),
            mean_time = measurement.mean_time,
            "final"
        );
        Ok(TrialResult::new(
            point.clone(),
            measurement.metadata,
            measurement.mean_time,
            measurement.samples,
        ))
    }
}
