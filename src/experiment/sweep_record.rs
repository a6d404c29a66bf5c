//! Sweep Record - lifecycle manifest of one sweep invocation

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Status of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepStatus {
    /// Created but no program built yet.
    Pending,
    /// Building or measuring.
    Running,
    /// Every grid point was measured.
    Success,
    /// Aborted by a fatal error; the table holds the rows flushed so far.
    Failed,
}

/// Manifest written next to a result table.
///
/// Records what was run and how far it got, so a partially written table can
/// be told apart from a complete one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepRecord {
    experiment: String,
    table: PathBuf,
    retries: u32,
    expected_rows: usize,
    rows_written: usize,
    status: SweepStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl SweepRecord {
    /// Create a record in Pending status.
    #[must_use]
    pub fn new(
        experiment: impl Into<String>,
        table: impl Into<PathBuf>,
        retries: u32,
        expected_rows: usize,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            table: table.into(),
            retries,
            expected_rows,
            rows_written: 0,
            status: SweepStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    /// Experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Path of the result table.
    #[must_use]
    pub fn table(&self) -> &Path {
        &self.table
    }

    /// Retries per grid point.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Grid size.
    #[must_use]
    pub const fn expected_rows(&self) -> usize {
        self.expected_rows
    }

    /// Rows flushed so far.
    #[must_use]
    pub const fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SweepStatus {
        self.status
    }

    /// Start timestamp, once running.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp, once finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Message of the error that aborted the sweep.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transition to Running and stamp the start time.
    pub fn start(&mut self) {
        self.status = SweepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record how many rows reached the table.
    pub fn set_rows_written(&mut self, rows: usize) {
        self.rows_written = rows;
    }

    /// Finish successfully.
    pub fn succeed(&mut self) {
        self.status = SweepStatus::Success;
        self.ended_at = Some(Utc::now());
    }

    /// Finish with a fatal error.
    pub fn fail(&mut self, error: impl ToString) {
        self.status = SweepStatus::Failed;
        self.error = Some(error.to_string());
        self.ended_at = Some(Utc::now());
    }

    /// Manifest path for a table: `stats.csv` becomes `stats.run.json`.
    #[must_use]
    pub fn manifest_path(table: &Path) -> PathBuf {
        table.with_extension("run.json")
    }

    /// Write the manifest as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or serialized.
    pub fn write_manifest(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_lifecycle() {
        let mut record = SweepRecord::new("pi", "stats.csv", 10, 2);
        assert_eq!(record.status(), SweepStatus::Pending);
        record.start();
        record.set_rows_written(2);
        record.succeed();
        assert_eq!(record.status(), SweepStatus::Success);
        assert_eq!(record.rows_written(), 2);
        assert!(record.ended_at().unwrap() >= record.started_at().unwrap());
    }

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            SweepRecord::manifest_path(Path::new("out/stats.csv")),
            PathBuf::from("out/stats.run.json")
        );
    }
}
