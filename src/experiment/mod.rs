//! Experiment data model
//!
//! ```text
//! ExperimentDescriptor ── Grid ──< GridPoint
//!                                     │
//!                                     └── TrialResult (1 per point) ──> ResultTable
//! SweepRecord: lifecycle manifest of one sweep
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use sweep_bench::experiment::ExperimentKind;
//!
//! let descriptor = ExperimentKind::Pi.descriptor()?;
//! assert_eq!(descriptor.grid().len(), 5 * 9);
//! assert_eq!(descriptor.join_keys(), ["points_number"]);
//! # Ok::<(), sweep_bench::Error>(())
//! ```

mod axis;
mod descriptor;
mod sweep_record;
mod trial_record;

pub use axis::{Axis, AxisValue, Grid, GridPoint, GridPoints};
pub use descriptor::{
    variant_label, Column, ColumnSource, ExperimentDescriptor, ExperimentDescriptorBuilder,
    ExperimentKind, ProductColumn, RowPolicy, Variants,
};
pub use sweep_record::{SweepRecord, SweepStatus};
pub use trial_record::TrialResult;
