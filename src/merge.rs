//! Baseline merger
//!
//! Joins every row of a result table to the row sharing all join keys with
//! concurrency 1, then derives
//!
//! ```text
//! speedup    = serial_time / time
//! efficiency = speedup / concurrency
//! ```
//!
//! The join must be one-to-one: a key with no baseline row, or with more
//! than one, is an error rather than a silent drop or an arbitrary pick.
//! Merging is pure; it never touches the filesystem.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::experiment::{ExperimentDescriptor, ProductColumn};
use crate::table::Table;
use crate::{Error, Result};

/// Column holding the baseline's mean time
pub const SERIAL_TIME: &str = "serial_time";
/// Column holding `serial_time / time`
pub const SPEEDUP: &str = "speedup";
/// Column holding `speedup / concurrency`
pub const EFFICIENCY: &str = "efficiency";

/// Which columns the merger reads and what it joins on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    concurrency: String,
    time: String,
    join_keys: Vec<String>,
    products: Vec<ProductColumn>,
}

impl MergePlan {
    /// Plan over explicit column names.
    #[must_use]
    pub fn new<S: Into<String>>(
        concurrency: impl Into<String>,
        time: impl Into<String>,
        join_keys: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            concurrency: concurrency.into(),
            time: time.into(),
            join_keys: join_keys.into_iter().map(Into::into).collect(),
            products: Vec::new(),
        }
    }

    /// Plan described by an experiment.
    #[must_use]
    pub fn for_experiment(descriptor: &ExperimentDescriptor) -> Self {
        Self {
            concurrency: descriptor.concurrency_axis().to_string(),
            time: descriptor.time_column().to_string(),
            join_keys: descriptor.join_keys().to_vec(),
            products: descriptor.products().to_vec(),
        }
    }

    /// Add a product column.
    #[must_use]
    pub fn with_product(mut self, product: ProductColumn) -> Self {
        self.products.push(product);
        self
    }

    /// Join key column names.
    #[must_use]
    pub fn join_keys(&self) -> &[String] {
        &self.join_keys
    }

    fn is_derived(&self, column: &str) -> bool {
        [SERIAL_TIME, SPEEDUP, EFFICIENCY].contains(&column)
            || self.products.iter().any(|p| p.name == column)
    }
}

/// One input row plus its baseline-relative metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    cells: Vec<String>,
    concurrency: u32,
    mean_time: f64,
    serial_time: f64,
    speedup: f64,
    efficiency: f64,
}

impl MergedRow {
    /// Input cells (minus previously derived columns) plus product cells.
    #[must_use]
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Concurrency of this row.
    #[must_use]
    pub const fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// This row's mean time.
    #[must_use]
    pub const fn mean_time(&self) -> f64 {
        self.mean_time
    }

    /// Mean time of the matching baseline row.
    #[must_use]
    pub const fn serial_time(&self) -> f64 {
        self.serial_time
    }

    /// `serial_time / mean_time`.
    #[must_use]
    pub const fn speedup(&self) -> f64 {
        self.speedup
    }

    /// `speedup / concurrency`.
    #[must_use]
    pub const fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Whether this row is its own baseline.
    #[must_use]
    pub const fn is_baseline(&self) -> bool {
        ExperimentDescriptor::is_baseline(self.concurrency)
    }
}

/// Result of a merge, in input row order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    columns: Vec<String>,
    rows: Vec<MergedRow>,
}

impl MergedTable {
    /// Columns of [`MergedRow::cells`].
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Merged rows.
    #[must_use]
    pub fn rows(&self) -> &[MergedRow] {
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

    /// Cell of a row by column name.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let i = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r.cells[i].as_str())
    }

    /// Flatten into a plain table with the derived columns appended.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let mut columns = self.columns.clone();
        columns.extend([SERIAL_TIME, SPEEDUP, EFFICIENCY].map(str::to_string));
        Table::from_parts(
            columns,
            self.rows
                .iter()
                .map(|row| {
                    let mut cells = row.cells.clone();
                    cells.extend([
                        row.serial_time.to_string(),
                        row.speedup.to_string(),
                        row.efficiency.to_string(),
                    ]);
                    cells
                })
                .collect(),
        )
    }
}

impl fmt::Display for MergedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_table(), f)
    }
}

fn render_key(plan: &MergePlan, key: &[Cow<'_, str>]) -> String {
    plan.join_keys
        .iter()
        .zip(key)
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Join key of a row. Numeric cells are compared by value, so `100`,
/// `100.0` and ` 100` name the same key.
fn key_of<'a>(row: &'a [String], key_idx: &[usize]) -> Vec<Cow<'a, str>> {
    key_idx.iter().map(|&k| key_cell(&row[k])).collect()
}

fn key_cell(cell: &str) -> Cow<'_, str> {
    let cell = cell.trim();
    if let Ok(int) = cell.parse::<i64>() {
        return Cow::Owned(int.to_string());
    }
    match cell.parse::<f64>() {
        Ok(float) if float.is_finite() => Cow::Owned(float.to_string()),
        _ => Cow::Borrowed(cell),
    }
}

fn malformed(row: usize, reason: String) -> Error {
    // header is line 1
    Error::MalformedRow {
        line: row as u64 + 2,
        reason,
    }
}

fn product_cell(factors: &[&str]) -> Option<String> {
    if let Ok(ints) = factors
        .iter()
        .map(|f| f.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        if let Some(product) = ints.iter().try_fold(1_i64, |acc, v| acc.checked_mul(*v)) {
            return Some(product.to_string());
        }
    }
    factors
        .iter()
        .map(|f| f.trim().parse::<f64>().ok())
        .product::<Option<f64>>()
        .map(|p| p.to_string())
}

/// Join a table against its own baseline rows and derive speedup and
/// efficiency.
///
/// Columns previously produced by a merge (`serial_time`, `speedup`,
/// `efficiency`, product columns) are dropped from the input and recomputed,
/// so merging a merged table is idempotent.
///
/// # Errors
///
/// Returns `Error::Schema` if a planned column is missing,
/// `Error::MalformedRow` if a concurrency or time cell is not numeric, and
/// `Error::Join` if any row's key has zero or several baseline rows.
pub fn merge(table: &Table, plan: &MergePlan) -> Result<MergedTable> {
    let concurrency_idx = table.column_index(&plan.concurrency)?;
    let time_idx = table.column_index(&plan.time)?;
    let key_idx = plan
        .join_keys
        .iter()
        .map(|k| table.column_index(k))
        .collect::<Result<Vec<_>>>()?;

    let kept: Vec<usize> = (0..table.columns().len())
        .filter(|&i| !plan.is_derived(&table.columns()[i]))
        .collect();
    let product_idx = plan
        .products
        .iter()
        .map(|p| {
            p.factors
                .iter()
                .map(|f| table.column_index(f))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut parsed = Vec::with_capacity(table.len());
    for (i, row) in table.rows().iter().enumerate() {
        let concurrency = row[concurrency_idx]
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|c| *c >= 1)
            .ok_or_else(|| {
                malformed(
                    i,
                    format!("concurrency {:?} is not a positive integer", row[concurrency_idx]),
                )
            })?;
        let time = row[time_idx]
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed(i, format!("time {:?} is not a number", row[time_idx])))?;
        parsed.push((concurrency, time));
    }

    let mut baselines: FxHashMap<Vec<Cow<'_, str>>, Vec<usize>> = FxHashMap::default();
    for (i, row) in table.rows().iter().enumerate() {
        if ExperimentDescriptor::is_baseline(parsed[i].0) {
            baselines.entry(key_of(row, &key_idx)).or_default().push(i);
        }
    }

    let mut columns: Vec<String> = kept.iter().map(|&i| table.columns()[i].clone()).collect();
    columns.extend(plan.products.iter().map(|p| p.name.clone()));

    let mut rows = Vec::with_capacity(table.len());
    for (i, row) in table.rows().iter().enumerate() {
        let key = key_of(row, &key_idx);
        let baseline = match baselines.get(&key).map(Vec::as_slice) {
            Some([only]) => *only,
            other => {
                return Err(Error::Join {
                    key: render_key(plan, &key),
                    matches: other.map_or(0, <[usize]>::len),
                });
            }
        };

        let mut cells: Vec<String> = kept.iter().map(|&k| row[k].clone()).collect();
        for (product, idx) in plan.products.iter().zip(&product_idx) {
            let factors: Vec<&str> = idx.iter().map(|&k| row[k].as_str()).collect();
            let cell = product_cell(&factors).ok_or_else(|| {
                malformed(i, format!("'{}' factors are not numeric", product.name))
            })?;
            cells.push(cell);
        }

        let (concurrency, mean_time) = parsed[i];
        let serial_time = parsed[baseline].1;
        let speedup = serial_time / mean_time;
        rows.push(MergedRow {
            cells,
            concurrency,
            mean_time,
            serial_time,
            speedup,
            efficiency: speedup / f64::from(concurrency),
        });
    }

    Ok(MergedTable { columns, rows })
}
