//! Persisted result tables
//!
//! **Append-only write pattern**: the sweep driver writes the header once and
//! then one comma-separated line per trial, flushing after every line so an
//! interrupted sweep keeps every row measured so far. Fields are never quoted;
//! an embedded comma is not representable.
//!
//! Reading is the reverse, with the descriptor's [`RowPolicy`] deciding
//! whether a malformed row is fatal or skipped.
//!
//! Merged tables can additionally be exported to Parquet for plotting tools.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tracing::warn;

use crate::experiment::{ExperimentDescriptor, RowPolicy, TrialResult};
use crate::table::Table;
use crate::{Error, Result};

/// Streaming writer for a result table.
pub struct TableWriter<'d, W: Write> {
    descriptor: &'d ExperimentDescriptor,
    writer: csv::Writer<W>,
    rows: usize,
}

impl<'d> TableWriter<'d, File> {
    /// Create (truncating) a table file and write its header.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P, descriptor: &'d ExperimentDescriptor) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(file, descriptor)
    }
}

impl<'d, W: Write> TableWriter<'d, W> {
    /// Wrap a writer and emit the header.
    ///
    /// # Errors
    ///
    /// Returns error if the header cannot be written.
    pub fn new(inner: W, descriptor: &'d ExperimentDescriptor) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(inner);
        writer.write_record(descriptor.header())?;
        writer.flush()?;
        Ok(Self {
            descriptor,
            writer,
            rows: 0,
        })
    }

    /// Append one trial and flush it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the trial does not fit the schema, or an IO
    /// error if the line cannot be written.
    pub fn append(&mut self, result: &TrialResult) -> Result<()> {
        let record = result.to_record(self.descriptor)?;
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows appended so far.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

/// Read a persisted table from a file.
///
/// # Errors
///
/// See [`read_table`].
pub fn read_table_path<P: AsRef<Path>>(
    path: P,
    descriptor: &ExperimentDescriptor,
) -> Result<Table> {
    let file = File::open(path.as_ref()).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open {}: {e}", path.as_ref().display()),
        ))
    })?;
    read_table(file, descriptor)
}

/// Read a persisted table, validating it against the descriptor.
///
/// Every row must have one field per column, a positive integer in the
/// concurrency column, a finite number in the time column, and a number in
/// every join key filled by an integer axis. Rows that do not are fatal under
/// [`RowPolicy::Strict`] and skipped with a warning under
/// [`RowPolicy::SkipMalformed`]. The lenient policy also accepts rows with
/// extra trailing fields and drops the extras.
///
/// # Errors
///
/// Returns `Error::Schema` if the header differs from the descriptor's,
/// `Error::MalformedRow` under the strict policy, or a CSV error.
pub fn read_table<R: Read>(reader: R, descriptor: &ExperimentDescriptor) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let expected = descriptor.header();
    let header = reader.headers()?.clone();
    if !header.iter().eq(expected.iter().copied()) {
        return Err(Error::Schema(format!(
            "table header [{}] does not match {} schema [{}]",
            header.iter().collect::<Vec<_>>().join(","),
            descriptor.name(),
            expected.join(",")
        )));
    }

    let mut table = Table::new(expected.iter().copied());
    let concurrency = table.column_index(descriptor.concurrency_axis())?;
    let time = table.column_index(descriptor.time_column())?;
    let numeric_keys = descriptor
        .join_keys()
        .iter()
        .filter(|key| is_numeric_axis(descriptor, key))
        .map(|key| Ok((key.as_str(), table.column_index(key)?)))
        .collect::<Result<Vec<_>>>()?;
    let policy = descriptor.row_policy();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);

        let width_ok = match policy {
            RowPolicy::Strict => record.len() == expected.len(),
            RowPolicy::SkipMalformed => record.len() >= expected.len(),
        };
        let problem = if width_ok {
            validate_numeric(&record, concurrency, time, &numeric_keys)
        } else {
            Some(format!(
                "expected {} fields, found {}",
                expected.len(),
                record.len()
            ))
        };

        match (problem, policy) {
            (None, _) => table.push(record.iter().take(expected.len()))?,
            (Some(reason), RowPolicy::Strict) => {
                return Err(Error::MalformedRow { line, reason });
            }
            (Some(reason), RowPolicy::SkipMalformed) => {
                warn!(line, %reason, "skipping malformed row");
            }
        }
    }

    Ok(table)
}

/// Whether `column` is filled by an axis whose values are all integers.
fn is_numeric_axis(descriptor: &ExperimentDescriptor, column: &str) -> bool {
    descriptor
        .axes()
        .iter()
        .find(|axis| axis.name() == column)
        .is_some_and(|axis| axis.values().iter().all(|v| v.as_int().is_some()))
}

fn validate_numeric(
    record: &csv::StringRecord,
    concurrency: usize,
    time: usize,
    numeric_keys: &[(&str, usize)],
) -> Option<String> {
    let value = &record[concurrency];
    if !value.trim().parse::<u32>().is_ok_and(|c| c >= 1) {
        return Some(format!("concurrency {value:?} is not a positive integer"));
    }
    let value = &record[time];
    if !value.trim().parse::<f64>().is_ok_and(f64::is_finite) {
        return Some(format!("time {value:?} is not a finite number"));
    }
    for &(name, idx) in numeric_keys {
        let value = &record[idx];
        if !value.trim().parse::<f64>().is_ok_and(f64::is_finite) {
            return Some(format!("{name} {value:?} is not a number"));
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Text,
}

fn infer_kind(cells: &[&str]) -> CellKind {
    if cells.is_empty() {
        CellKind::Text
    } else if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
        CellKind::Int
    } else if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
        CellKind::Float
    } else {
        CellKind::Text
    }
}

/// Convert a table to an Arrow batch, inferring `Int64`, `Float64` or `Utf8`
/// per column.
///
/// # Errors
///
/// Returns an Arrow error if the batch cannot be assembled.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len());

    for name in table.columns() {
        let cells = table.column(name)?;
        let (data_type, array): (DataType, ArrayRef) = match infer_kind(&cells) {
            CellKind::Int => (
                DataType::Int64,
                Arc::new(Int64Array::from_iter_values(
                    cells.iter().filter_map(|c| c.parse::<i64>().ok()),
                )),
            ),
            CellKind::Float => (
                DataType::Float64,
                Arc::new(Float64Array::from_iter_values(
                    cells.iter().filter_map(|c| c.parse::<f64>().ok()),
                )),
            ),
            CellKind::Text => (
                DataType::Utf8,
                Arc::new(StringArray::from_iter_values(cells.iter().copied())),
            ),
        };
        fields.push(Field::new(name.as_str(), data_type, false));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Write a table as a single-row-group Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be created or encoded.
pub fn write_parquet<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let batch = to_record_batch(table)?;
    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
