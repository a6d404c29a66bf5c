//! Sweep driver
//!
//! Builds the program(s) of an experiment once, then measures every grid
//! point in order, appending and flushing one row per point. The result has
//! exactly one row per point of the grid; the first fatal error stops the
//! sweep, leaving the rows flushed so far on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::build::Toolchain;
use crate::experiment::{
    variant_label, AxisValue, ExperimentDescriptor, GridPoint, SweepRecord, TrialResult,
};
use crate::runner::{Executor, TrialRunner};
use crate::storage::TableWriter;
use crate::table::Table;
use crate::{Error, Result};

/// Executables produced by the build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Programs {
    /// One executable for every point
    Single(PathBuf),
    /// One executable per value of a variant axis
    Variants {
        /// Axis selecting the executable
        axis: String,
        /// `(axis value, executable)` pairs
        executables: Vec<(AxisValue, PathBuf)>,
    },
}

impl Programs {
    /// Executable for a grid point.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if no executable was built for the
    /// point's variant.
    pub fn resolve(&self, point: &GridPoint) -> Result<&Path> {
        match self {
            Self::Single(path) => Ok(path),
            Self::Variants { axis, executables } => {
                let value = point.get(axis).ok_or_else(|| {
                    Error::InvalidInput(format!("point [{point}] has no '{axis}' value"))
                })?;
                executables
                    .iter()
                    .find(|(v, _)| v == value)
                    .map(|(_, path)| path.as_path())
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("no executable built for {axis}={value}"))
                    })
            }
        }
    }
}

/// In-memory copy of a completed sweep, in grid order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    rows: Vec<TrialResult>,
}

impl ResultTable {
    /// Trial results in grid order.
    #[must_use]
    pub fn rows(&self) -> &[TrialResult] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a plain table with the descriptor's header.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if a row does not fit the schema.
    pub fn to_table(&self, descriptor: &ExperimentDescriptor) -> Result<Table> {
        let mut table = Table::new(descriptor.header());
        for row in &self.rows {
            table.push(row.to_record(descriptor)?)?;
        }
        Ok(table)
    }
}

/// Drives one experiment end to end.
#[derive(Debug)]
pub struct SweepDriver<T, E> {
    descriptor: ExperimentDescriptor,
    toolchain: T,
    runner: TrialRunner<E>,
}

impl<T: Toolchain, E: Executor> SweepDriver<T, E> {
    /// Driver for `descriptor`.
    #[must_use]
    pub const fn new(descriptor: ExperimentDescriptor, toolchain: T, runner: TrialRunner<E>) -> Self {
        Self {
            descriptor,
            toolchain,
            runner,
        }
    }

    /// The experiment being swept.
    #[must_use]
    pub const fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }

    /// Build every source the experiment needs for the requested file.
    ///
    /// # Errors
    ///
    /// Propagates toolchain errors, and returns `Error::Schema` if a variant
    /// source's label is not a value of the variant axis.
    pub fn build(&self, requested: &Path) -> Result<Programs> {
        let sources = self.descriptor.sources_for(requested);
        let Some(variants) = self.descriptor.variants() else {
            return Ok(Programs::Single(self.toolchain.build(requested)?));
        };

        let allowed = self
            .descriptor
            .axes()
            .iter()
            .find(|a| a.name() == variants.axis)
            .map(|a| a.values().to_vec())
            .unwrap_or_default();

        let mut executables = Vec::with_capacity(sources.len());
        for source in sources {
            let executable = self.toolchain.build(&source)?;
            let label = AxisValue::from(variant_label(&source.to_string_lossy()));
            if !allowed.contains(&label) {
                return Err(Error::Schema(format!(
                    "{} builds variant '{label}' which is not a value of '{}'",
                    source.display(),
                    variants.axis
                )));
            }
            executables.push((label, executable));
        }

        Ok(Programs::Variants {
            axis: variants.axis.clone(),
            executables,
        })
    }

    /// Measure every grid point, appending each row to `writer` as it lands.
    ///
    /// # Errors
    ///
    /// Returns the first trial or write error.
    pub fn sweep<W: Write>(
        &self,
        programs: &Programs,
        writer: &mut TableWriter<'_, W>,
    ) -> Result<ResultTable> {
        let grid = self.descriptor.grid();
        info!(
            experiment = self.descriptor.name(),
            points = grid.len(),
            retries = self.runner.retries(),
            "starting sweep"
        );

        let mut table = ResultTable {
            rows: Vec::with_capacity(grid.len()),
        };
        for point in grid.points() {
            let program = programs.resolve(&point)?;
            let result = self.runner.run_trial(&self.descriptor, &point, program)?;
            writer.append(&result)?;
            table.rows.push(result);
        }

        info!(experiment = self.descriptor.name(), rows = table.len(), "sweep complete");
        Ok(table)
    }

    /// Build, sweep into `output`, and write the sweep manifest beside it.
    ///
    /// # Errors
    ///
    /// Returns the first build, trial or IO error; the manifest records the
    /// failure and the number of rows already flushed.
    pub fn run(&self, requested: &Path, output: &Path) -> Result<(ResultTable, SweepRecord)> {
        let mut record = SweepRecord::new(
            self.descriptor.name(),
            output,
            self.runner.retries(),
            self.descriptor.grid().len(),
        );
        record.start();

        let mut rows_written = 0;
        let outcome = self.build(requested).and_then(|programs| {
            let mut writer = TableWriter::create(output, &self.descriptor)?;
            let result = self.sweep(&programs, &mut writer);
            rows_written = writer.rows();
            result
        });
        record.set_rows_written(rows_written);

        let manifest = SweepRecord::manifest_path(output);
        match outcome {
            Ok(table) => {
                record.succeed();
                record.write_manifest(&manifest)?;
                Ok((table, record))
            }
            Err(err) => {
                error!(experiment = self.descriptor.name(), rows_written, %err, "sweep aborted");
                record.fail(&err);
                if let Err(manifest_err) = record.write_manifest(&manifest) {
                    error!(%manifest_err, "could not write sweep manifest");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::experiment::{Axis, Column, ExperimentKind};
    use crate::runner::Invocation;

    struct NoBuild;

    impl Toolchain for NoBuild {
        fn build(&self, source: &Path) -> Result<PathBuf> {
            Ok(crate::build::executable_path(source))
        }
    }

    fn echo_size(inv: &Invocation) -> Result<String> {
        Ok(format!("noise\n|{},{}|\n", inv.args[0], 0.5 / f64::from(inv.concurrency)))
    }

    #[test]
    fn test_grid_cardinality() {
        let descriptor = ExperimentDescriptor::builder("grid")
            .concurrency_axis("threads", &[1, 2, 4])
            .axis(Axis::new("size", [10, 20, 30, 40]))
            .arguments(["size"])
            .schema(vec![
                Column::axis("threads"),
                Column::payload("size"),
                Column::mean_time("time"),
            ])
            .build()
            .unwrap();
        let runner = TrialRunner::new(echo_size, 2).unwrap().with_pause(Duration::ZERO);
        let driver = SweepDriver::new(descriptor.clone(), NoBuild, runner);

        let programs = driver.build(Path::new("grid.c")).unwrap();
        let mut writer = TableWriter::new(Vec::new(), &descriptor).unwrap();
        let table = driver.sweep(&programs, &mut writer).unwrap();

        assert_eq!(table.len(), 12);
        let unique: HashSet<String> = table.rows().iter().map(|r| r.point().to_string()).collect();
        assert_eq!(unique.len(), 12);
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 13);
        assert_eq!(text.lines().nth(1), Some("1,10,0.5"));
    }

    #[test]
    fn test_variant_programs() {
        let descriptor = ExperimentKind::MatVec.descriptor().unwrap();
        let runner = TrialRunner::new(echo_size, 1).unwrap();
        let driver = SweepDriver::new(descriptor, NoBuild, runner);
        let programs = driver.build(Path::new("lab/second.c")).unwrap();
        let point = driver.descriptor().grid().points().last().unwrap();
        assert_eq!(
            programs.resolve(&point).unwrap(),
            Path::new("lab/second_columns")
        );
    }
}
