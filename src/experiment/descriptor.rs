//! Experiment descriptors and the built-in catalog
//!
//! A descriptor is immutable configuration: the grid, how a grid point turns
//! into program arguments, the persisted schema, and what the baseline
//! merger joins on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::axis::{Axis, AxisValue, Grid, GridPoint};
use crate::runner::Invocation;
use crate::{Error, Result};

/// Where a schema column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    /// The grid point's value for the axis of the same name
    Axis,
    /// The next metadata field of the timing token
    Payload,
    /// Averaged elapsed time
    MeanTime,
}

/// One column of the persisted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    source: ColumnSource,
}

impl Column {
    /// Column filled from the axis of the same name.
    #[must_use]
    pub fn axis(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ColumnSource::Axis,
        }
    }

    /// Column filled from the timing token metadata.
    #[must_use]
    pub fn payload(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ColumnSource::Payload,
        }
    }

    /// Column holding the averaged elapsed time.
    #[must_use]
    pub fn mean_time(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ColumnSource::MeanTime,
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value source.
    #[must_use]
    pub const fn source(&self) -> ColumnSource {
        self.source
    }
}

/// What the table reader does with a row it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Fail with `Error::MalformedRow`
    #[default]
    Strict,
    /// Log and drop the row
    SkipMalformed,
}

/// Column computed as the product of other numeric columns at merge time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductColumn {
    /// Output column name
    pub name: String,
    /// Columns multiplied together
    pub factors: Vec<String>,
}

/// Several sources compiled to sibling executables, one per value of an axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variants {
    /// Axis whose value selects the executable
    pub axis: String,
    /// Source file names, relative to the directory of the requested file
    pub sources: Vec<String>,
}

/// Label of a variant executable: the text after the last `_` of its stem.
///
/// `second_rows.c` is labelled `rows`.
#[must_use]
pub fn variant_label(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map_or_else(|| source.to_string(), |s| s.to_string_lossy().into_owned());
    stem.rsplit('_').next().unwrap_or(&stem).to_string()
}

/// Immutable description of one experiment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentDescriptor {
    name: String,
    title: String,
    axes: Vec<Axis>,
    concurrency_axis: String,
    arguments: Vec<String>,
    schema: Vec<Column>,
    join_keys: Vec<String>,
    row_policy: RowPolicy,
    variants: Option<Variants>,
    products: Vec<ProductColumn>,
}

impl ExperimentDescriptor {
    /// Start building a descriptor.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ExperimentDescriptorBuilder {
        ExperimentDescriptorBuilder::new(name)
    }

    /// Short experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Axes in enumeration order (outermost first).
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// The parameter grid.
    #[must_use]
    pub fn grid(&self) -> Grid<'_> {
        Grid::new(&self.axes)
    }

    /// Name of the process/thread-count axis.
    #[must_use]
    pub fn concurrency_axis(&self) -> &str {
        &self.concurrency_axis
    }

    /// Axes passed to the program as positional arguments, in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Persisted columns in order.
    #[must_use]
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    /// Header row of the persisted table.
    #[must_use]
    pub fn header(&self) -> Vec<&str> {
        self.schema.iter().map(Column::name).collect()
    }

    /// Names of the payload columns, in token order.
    #[must_use]
    pub fn payload_fields(&self) -> Vec<&str> {
        self.schema
            .iter()
            .filter(|c| c.source == ColumnSource::Payload)
            .map(Column::name)
            .collect()
    }

    /// Name of the averaged-time column.
    #[must_use]
    pub fn time_column(&self) -> &str {
        self.schema
            .iter()
            .find(|c| c.source == ColumnSource::MeanTime)
            .map_or("time", Column::name)
    }

    /// Columns the baseline merger joins on.
    #[must_use]
    pub fn join_keys(&self) -> &[String] {
        &self.join_keys
    }

    /// Whether a concurrency value marks a baseline row.
    #[must_use]
    pub const fn is_baseline(concurrency: u32) -> bool {
        concurrency == 1
    }

    /// Reader policy for malformed persisted rows.
    #[must_use]
    pub const fn row_policy(&self) -> RowPolicy {
        self.row_policy
    }

    /// Copy of this descriptor with a different row policy.
    #[must_use]
    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Multi-source variants, if the experiment compares several programs.
    #[must_use]
    pub const fn variants(&self) -> Option<&Variants> {
        self.variants.as_ref()
    }

    /// Product columns added when merging.
    #[must_use]
    pub fn products(&self) -> &[ProductColumn] {
        &self.products
    }

    /// Source files to build for a requested file.
    ///
    /// Single-program experiments build the requested file itself; variant
    /// experiments build their sources next to it.
    #[must_use]
    pub fn sources_for(&self, requested: &Path) -> Vec<PathBuf> {
        match &self.variants {
            None => vec![requested.to_path_buf()],
            Some(variants) => {
                let dir = requested.parent().unwrap_or_else(|| Path::new(""));
                variants.sources.iter().map(|s| dir.join(s)).collect()
            }
        }
    }

    /// Map a grid point through the invocation template.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the point lacks an argument axis or
    /// its concurrency value is not a positive integer.
    pub fn invocation(&self, point: &GridPoint, program: &Path) -> Result<Invocation> {
        let concurrency = point
            .get(&self.concurrency_axis)
            .and_then(AxisValue::as_int)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "point [{point}] has no positive '{}' value",
                    self.concurrency_axis
                ))
            })?;

        let args = self
            .arguments
            .iter()
            .map(|axis| {
                point.get(axis).map(ToString::to_string).ok_or_else(|| {
                    Error::InvalidInput(format!("point [{point}] has no value for '{axis}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Invocation {
            program: program.to_path_buf(),
            concurrency,
            args,
        })
    }
}

/// Builder for `ExperimentDescriptor`.
#[derive(Debug)]
pub struct ExperimentDescriptorBuilder {
    name: String,
    title: Option<String>,
    axes: Vec<Axis>,
    concurrency_axis: Option<String>,
    arguments: Vec<String>,
    schema: Vec<Column>,
    join_keys: Option<Vec<String>>,
    row_policy: RowPolicy,
    variants: Option<Variants>,
    products: Vec<ProductColumn>,
}

impl ExperimentDescriptorBuilder {
    /// Create a builder with only a name set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            axes: Vec::new(),
            concurrency_axis: None,
            arguments: Vec::new(),
            schema: Vec::new(),
            join_keys: None,
            row_policy: RowPolicy::Strict,
            variants: None,
            products: Vec::new(),
        }
    }

    /// Human-readable title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append an axis (later axes vary faster).
    #[must_use]
    pub fn axis(mut self, axis: Axis) -> Self {
        self.axes.push(axis);
        self
    }

    /// Append the concurrency axis and mark it as such.
    #[must_use]
    pub fn concurrency_axis(mut self, name: impl Into<String>, values: &[u32]) -> Self {
        let name = name.into();
        self.axes.push(Axis::new(name.clone(), values.iter().copied()));
        self.concurrency_axis = Some(name);
        self
    }

    /// Compile several sources and select among them by a leading axis.
    ///
    /// The axis values are the sources' [`variant_label`]s.
    #[must_use]
    pub fn variants<S: Into<String>>(
        mut self,
        axis: impl Into<String>,
        sources: impl IntoIterator<Item = S>,
    ) -> Self {
        let axis = axis.into();
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        let labels: Vec<String> = sources.iter().map(|s| variant_label(s)).collect();
        self.axes.insert(0, Axis::new(axis.clone(), labels));
        self.variants = Some(Variants { axis, sources });
        self
    }

    /// Axes passed to the program as positional arguments.
    #[must_use]
    pub fn arguments<S: Into<String>>(mut self, axes: impl IntoIterator<Item = S>) -> Self {
        self.arguments = axes.into_iter().map(Into::into).collect();
        self
    }

    /// Persisted columns, in order.
    #[must_use]
    pub fn schema(mut self, columns: Vec<Column>) -> Self {
        self.schema = columns;
        self
    }

    /// Override the join keys (default: every axis but the concurrency axis).
    #[must_use]
    pub fn join_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.join_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Reader policy for malformed rows.
    #[must_use]
    pub const fn row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Add a merge-time product column.
    #[must_use]
    pub fn product<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        factors: impl IntoIterator<Item = S>,
    ) -> Self {
        self.products.push(ProductColumn {
            name: name.into(),
            factors: factors.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate and build the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the concurrency axis is missing or not a
    /// column, an axis column or argument names no axis, there is not exactly
    /// one mean-time column, or a join key or product factor is not a column.
    pub fn build(self) -> Result<ExperimentDescriptor> {
        let concurrency_axis = self
            .concurrency_axis
            .ok_or_else(|| Error::Schema(format!("{}: no concurrency axis", self.name)))?;
        let has_axis = |name: &str| self.axes.iter().any(|a| a.name() == name);
        let has_column = |name: &str| self.schema.iter().any(|c| c.name() == name);

        for column in &self.schema {
            if column.source == ColumnSource::Axis && !has_axis(column.name()) {
                return Err(Error::Schema(format!(
                    "{}: axis column '{}' names no axis",
                    self.name,
                    column.name()
                )));
            }
        }
        if let Some(arg) = self.arguments.iter().find(|a| !has_axis(a.as_str())) {
            return Err(Error::Schema(format!(
                "{}: argument '{arg}' names no axis",
                self.name
            )));
        }
        let timed = self
            .schema
            .iter()
            .filter(|c| c.source == ColumnSource::MeanTime)
            .count();
        if timed != 1 {
            return Err(Error::Schema(format!(
                "{}: expected one mean-time column, found {timed}",
                self.name
            )));
        }
        if !self
            .schema
            .iter()
            .any(|c| c.name() == concurrency_axis && c.source == ColumnSource::Axis)
        {
            return Err(Error::Schema(format!(
                "{}: concurrency axis '{concurrency_axis}' must be an axis column",
                self.name
            )));
        }

        let join_keys = self.join_keys.unwrap_or_else(|| {
            self.axes
                .iter()
                .map(Axis::name)
                .filter(|name| *name != concurrency_axis)
                .map(str::to_string)
                .collect()
        });
        if let Some(key) = join_keys
            .iter()
            .find(|k| !has_column(k.as_str()) || **k == concurrency_axis)
        {
            return Err(Error::Schema(format!(
                "{}: join key '{key}' is not a non-concurrency column",
                self.name
            )));
        }
        if let Some(factor) = self
            .products
            .iter()
            .flat_map(|p| &p.factors)
            .find(|f| !has_column(f.as_str()))
        {
            return Err(Error::Schema(format!(
                "{}: product factor '{factor}' is not a column",
                self.name
            )));
        }

        Ok(ExperimentDescriptor {
            title: self.title.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            axes: self.axes,
            concurrency_axis,
            arguments: self.arguments,
            schema: self.schema,
            join_keys,
            row_policy: self.row_policy,
            variants: self.variants,
            products: self.products,
        })
    }
}

/// Built-in experiment types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentKind {
    /// Monte-Carlo estimate of pi
    Pi,
    /// Matrix-vector product, row and column decompositions
    MatVec,
    /// Matrix-matrix product on a square process grid
    MatMul,
}

const PROCESS_COUNTS: [u32; 5] = [1, 3, 5, 7, 10];

impl ExperimentKind {
    /// Every built-in experiment.
    pub const ALL: [Self; 3] = [Self::Pi, Self::MatVec, Self::MatMul];

    /// Short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pi => "pi",
            Self::MatVec => "matvec",
            Self::MatMul => "matmul",
        }
    }

    /// Resolve an experiment from its name or from a source filename.
    ///
    /// Filenames are matched the way the lab tasks are numbered: `first`
    /// selects pi, `second` the matrix-vector product, `third` the
    /// matrix-matrix product.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownExperiment` if nothing matches.
    pub fn resolve(name_or_file: &str) -> Result<Self> {
        if let Some(kind) = Self::ALL.into_iter().find(|k| k.name() == name_or_file) {
            return Ok(kind);
        }
        let file = Path::new(name_or_file)
            .file_name()
            .map_or_else(|| name_or_file.to_string(), |f| f.to_string_lossy().into_owned());
        [("first", Self::Pi), ("second", Self::MatVec), ("third", Self::MatMul)]
            .into_iter()
            .find(|(needle, _)| file.contains(needle))
            .map(|(_, kind)| kind)
            .ok_or_else(|| Error::UnknownExperiment(name_or_file.to_string()))
    }

    /// The built-in descriptor for this experiment.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in table; the `Result` is the builder's.
    pub fn descriptor(self) -> Result<ExperimentDescriptor> {
        match self {
            Self::Pi => ExperimentDescriptor::builder(self.name())
                .title("Monte-Carlo pi")
                .concurrency_axis("threads", &PROCESS_COUNTS)
                .axis(Axis::new(
                    "points_number",
                    [
                        100_i64,
                        1_000,
                        10_000,
                        100_000,
                        1_000_000,
                        10_000_000,
                        100_000_000,
                        300_000_000,
                        1_000_000_000,
                    ],
                ))
                .arguments(["points_number"])
                .schema(vec![
                    Column::axis("threads"),
                    Column::payload("pi"),
                    Column::payload("points_number"),
                    Column::mean_time("time"),
                ])
                .build(),
            Self::MatVec => ExperimentDescriptor::builder(self.name())
                .title("Matrix-vector product")
                .variants("algorithm", ["second_rows.c", "second_columns.c"])
                .concurrency_axis("threads", &PROCESS_COUNTS)
                .axis(Axis::new("row_size", [10_i64, 100, 1_000]))
                .axis(Axis::new("column_size", [10_i64, 100_000]))
                .arguments(["row_size", "column_size"])
                .schema(vec![
                    Column::axis("algorithm"),
                    Column::axis("threads"),
                    Column::payload("total_sum"),
                    Column::payload("row_size"),
                    Column::payload("column_size"),
                    Column::mean_time("time"),
                ])
                .product("size", ["row_size", "column_size"])
                .build(),
            Self::MatMul => ExperimentDescriptor::builder(self.name())
                .title("Matrix-matrix product")
                .concurrency_axis("threads", &[1, 4])
                .axis(Axis::new("points_number", [100_i64, 400, 800, 1_200]))
                .arguments(["points_number"])
                .schema(vec![
                    Column::axis("threads"),
                    Column::payload("points_number"),
                    Column::payload("processes"),
                    Column::mean_time("time"),
                ])
                .row_policy(RowPolicy::SkipMalformed)
                .build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_label() {
        assert_eq!(variant_label("second_rows.c"), "rows");
        assert_eq!(variant_label("dir/second_columns.c"), "columns");
        assert_eq!(variant_label("plain.c"), "plain");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(ExperimentKind::resolve("first.c").unwrap(), ExperimentKind::Pi);
        assert_eq!(
            ExperimentKind::resolve("labs/second_rows.c").unwrap(),
            ExperimentKind::MatVec
        );
        assert_eq!(ExperimentKind::resolve("third.c").unwrap(), ExperimentKind::MatMul);
        assert_eq!(ExperimentKind::resolve("matmul").unwrap(), ExperimentKind::MatMul);
        assert!(matches!(
            ExperimentKind::resolve("fourth.c"),
            Err(Error::UnknownExperiment(_))
        ));
    }

    #[test]
    fn test_catalog_builds() {
        for kind in ExperimentKind::ALL {
            let descriptor = kind.descriptor().unwrap();
            assert_eq!(descriptor.concurrency_axis(), "threads");
            assert_eq!(descriptor.time_column(), "time");
        }
    }

    #[test]
    fn test_matvec_layout() {
        let d = ExperimentKind::MatVec.descriptor().unwrap();
        assert_eq!(
            d.header(),
            ["algorithm", "threads", "total_sum", "row_size", "column_size", "time"]
        );
        assert_eq!(d.join_keys(), ["algorithm", "row_size", "column_size"]);
        assert_eq!(d.payload_fields(), ["total_sum", "row_size", "column_size"]);
        assert_eq!(d.axes()[0].values(), [AxisValue::from("rows"), AxisValue::from("columns")]);
        assert_eq!(d.grid().len(), 2 * 5 * 3 * 2);
        assert_eq!(
            d.sources_for(Path::new("lab/second.c")),
            [PathBuf::from("lab/second_rows.c"), PathBuf::from("lab/second_columns.c")]
        );
    }

    #[test]
    fn test_invocation() {
        let d = ExperimentKind::MatVec.descriptor().unwrap();
        let point = d.grid().points().nth(1).unwrap();
        let inv = d.invocation(&point, Path::new("./second_rows")).unwrap();
        assert_eq!(inv.concurrency, 1);
        assert_eq!(inv.args, ["10", "100000"]);
    }

    #[test]
    fn test_build_rejects_bad_schema() {
        let missing_time = ExperimentDescriptor::builder("x")
            .concurrency_axis("threads", &[1])
            .schema(vec![Column::axis("threads")])
            .build();
        assert!(matches!(missing_time, Err(Error::Schema(_))));

        let bad_key = ExperimentDescriptor::builder("x")
            .concurrency_axis("threads", &[1])
            .schema(vec![Column::axis("threads"), Column::mean_time("time")])
            .join_keys(["size"])
            .build();
        assert!(matches!(bad_key, Err(Error::Schema(_))));

        let no_concurrency = ExperimentDescriptor::builder("x")
            .schema(vec![Column::mean_time("time")])
            .build();
        assert!(matches!(no_concurrency, Err(Error::Schema(_))));
    }
}
