//! Harness configuration
//!
//! Defaults reproduce the lab setup: ten retries, 100 ms between runs,
//! `mpicc` to build and `mpiexec -n N` to launch. A JSON file can override
//! any subset of fields; the command line overrides the file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build::{BuildPolicy, MpiccToolchain};
use crate::experiment::{ExperimentDescriptor, RowPolicy};
use crate::runner::{Launcher, ProcessExecutor, TrialRunner};
use crate::{Error, Result};

/// Default runs per grid point
pub const DEFAULT_RETRIES: u32 = 10;

/// Settings shared by every experiment of one harness invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Runs averaged per grid point
    pub retries: u32,
    /// Pause between consecutive runs, in milliseconds
    pub pause_ms: u64,
    /// How programs are started
    pub launcher: Launcher,
    /// Compiler wrapper used to build sources
    pub compiler: String,
    /// Reaction to a failed build
    pub build_policy: BuildPolicy,
    /// Override of the experiment's malformed-row policy
    pub row_policy: Option<RowPolicy>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            pause_ms: 100,
            launcher: Launcher::default(),
            compiler: "mpicc".to_string(),
            build_policy: BuildPolicy::FailFast,
            row_policy: None,
        }
    }
}

impl HarnessConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Load a JSON config file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON, or fails
    /// validation.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `retries` is zero or the compiler is
    /// empty.
    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(Error::InvalidInput("retries must be at least 1".to_string()));
        }
        if self.compiler.trim().is_empty() {
            return Err(Error::InvalidInput("compiler must not be empty".to_string()));
        }
        Ok(())
    }

    /// Pause between runs.
    #[must_use]
    pub const fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Toolchain described by this config.
    #[must_use]
    pub fn toolchain(&self) -> MpiccToolchain {
        MpiccToolchain::new(self.compiler.clone(), self.build_policy)
    }

    /// Trial runner spawning real processes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `retries` is zero.
    pub fn runner(&self) -> Result<TrialRunner<ProcessExecutor>> {
        Ok(TrialRunner::new(ProcessExecutor::new(self.launcher.clone()), self.retries)?
            .with_pause(self.pause()))
    }

    /// Apply the row-policy override, if any, to a descriptor.
    #[must_use]
    pub fn apply(&self, descriptor: ExperimentDescriptor) -> ExperimentDescriptor {
        match self.row_policy {
            Some(policy) => descriptor.with_row_policy(policy),
            None => descriptor,
        }
    }
}

/// Builder for `HarnessConfig`.
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// Start from an existing config (e.g. one loaded from a file).
    #[must_use]
    pub const fn from_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Runs averaged per grid point.
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Pause between runs.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn pause(mut self, pause: Duration) -> Self {
        self.config.pause_ms = pause.as_millis() as u64;
        self
    }

    /// Launcher for programs under test.
    #[must_use]
    pub fn launcher(mut self, launcher: Launcher) -> Self {
        self.config.launcher = launcher;
        self
    }

    /// Compiler wrapper.
    #[must_use]
    pub fn compiler(mut self, compiler: impl Into<String>) -> Self {
        self.config.compiler = compiler.into();
        self
    }

    /// Reaction to a failed build.
    #[must_use]
    pub const fn build_policy(mut self, policy: BuildPolicy) -> Self {
        self.config.build_policy = policy;
        self
    }

    /// Override the experiment's malformed-row policy.
    #[must_use]
    pub const fn row_policy(mut self, policy: RowPolicy) -> Self {
        self.config.row_policy = Some(policy);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`HarnessConfig::validate`].
    pub fn build(self) -> Result<HarnessConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
