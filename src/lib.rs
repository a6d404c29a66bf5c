//! # sweep-bench: parameter-sweep benchmark harness
//!
//! Builds an externally written parallel program once, runs it across a grid
//! of process counts and problem sizes, averages the elapsed times reported
//! by each run, and derives speedup and efficiency against the
//! single-process baseline.
//!
//! ## Pipeline
//!
//! ```text
//! ExperimentDescriptor ─> SweepDriver ─(TrialRunner × grid)─> stats.csv
//!                                                               │
//!                                  MergedTable <─ merge() <─ read_table()
//! ```
//!
//! - [`token`]: the `|meta,...,elapsed|` wire contract with the program
//! - [`runner`]: repeated runs of one grid point, averaged
//! - [`sweep`]: grid enumeration, per-row flushing, sweep manifest
//! - [`merge`]: baseline join, speedup and efficiency
//!
//! ## Example
//!
//! ```rust
//! use sweep_bench::experiment::ExperimentKind;
//! use sweep_bench::merge::{merge, MergePlan};
//! use sweep_bench::table::Table;
//!
//! let descriptor = ExperimentKind::Pi.descriptor()?;
//! let mut table = Table::new(descriptor.header());
//! table.push(["1", "3.14", "1000000", "10"])?;
//! table.push(["5", "3.14", "1000000", "2.5"])?;
//!
//! let merged = merge(&table, &MergePlan::for_experiment(&descriptor))?;
//! assert!((merged.rows()[1].speedup() - 4.0).abs() < 1e-12);
//! assert!((merged.rows()[1].efficiency() - 0.8).abs() < 1e-12);
//! # Ok::<(), sweep_bench::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod build;
pub mod config;
pub mod error;
pub mod experiment;
pub mod merge;
pub mod runner;
pub mod storage;
pub mod sweep;
pub mod table;
pub mod token;

pub use error::{Error, Result};
