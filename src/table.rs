//! Plain string-celled table
//!
//! The persisted result table and the merged table both pass through this
//! shape: a header and rows of cells, addressed by column name.

use std::fmt;

use crate::{Error, Result};

/// Header plus rows of string cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Empty table with the given header.
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Table from a header and rows already known to match it.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the row width differs from the header.
    pub fn push<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) -> Result<()> {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(Error::Schema(format!(
                "row has {} cells, header has {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
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

    /// Position of a column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if no column has that name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::Schema(format!("no column named '{name}'")))
    }

    /// All cells of one column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if no column has that name.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let i = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[i].as_str()).collect())
    }
}

impl fmt::Display for Table {
    /// Right-aligned text rendering, one line per row.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                self.rows
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            for (i, (cell, &width)) in cells.iter().zip(&widths).enumerate() {
                if i > 0 {
                    f.write_str("  ")?;
                }
                write!(f, "{cell:>width$}")?;
            }
            writeln!(f)
        };

        line(f, &self.columns)?;
        for row in &self.rows {
            line(f, row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_checks_width() {
        let mut table = Table::new(["threads", "time"]);
        table.push(["1", "0.5"]).unwrap();
        assert!(table.push(["1"]).is_err());
        assert_eq!(table.len(), 1);
        assert_eq!(table.column("time").unwrap(), ["0.5"]);
        assert!(table.column_index("speedup").is_err());
    }

    #[test]
    fn test_display_aligns_columns() {
        let mut table = Table::new(["threads", "time"]);
        table.push(["10", "0.125"]).unwrap();
        let rendered = table.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, ["threads   time", "     10  0.125"]);
    }
}
