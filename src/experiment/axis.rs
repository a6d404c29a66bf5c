//! Axes and the Cartesian grid they span

use std::fmt;

use serde::{Deserialize, Serialize};

/// One discrete value of an axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// Numeric value (process count, problem size)
    Int(i64),
    /// Label value (algorithm variant)
    Text(String),
}

impl AxisValue {
    /// Integer view of the value, if it is numeric.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for AxisValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AxisValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for AxisValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for AxisValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A named independent variable and its ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    values: Vec<AxisValue>,
}

impl Axis {
    /// Create an axis from any iterable of values.
    #[must_use]
    pub fn new<V: Into<AxisValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Axis name (also its column name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in declared order.
    #[must_use]
    pub fn values(&self) -> &[AxisValue] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the axis has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One axis-value tuple of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    coordinates: Vec<(String, AxisValue)>,
}

impl GridPoint {
    /// Value of the named axis at this point.
    #[must_use]
    pub fn get(&self, axis: &str) -> Option<&AxisValue> {
        self.coordinates
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value)
    }

    /// `(axis, value)` pairs in axis order.
    #[must_use]
    pub fn coordinates(&self) -> &[(String, AxisValue)] {
        &self.coordinates
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.coordinates.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Cartesian product of a set of axes.
///
/// Points are enumerated with the first axis outermost and the last axis
/// varying fastest.
#[derive(Debug, Clone, Copy)]
pub struct Grid<'a> {
    axes: &'a [Axis],
}

impl<'a> Grid<'a> {
    /// Grid over the given axes.
    #[must_use]
    pub const fn new(axes: &'a [Axis]) -> Self {
        Self { axes }
    }

    /// Number of points: the product of axis cardinalities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.iter().map(Axis::len).product()
    }

    /// Whether the grid has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate points in grid order.
    #[must_use]
    pub fn points(&self) -> GridPoints<'a> {
        GridPoints {
            axes: self.axes,
            cursor: vec![0; self.axes.len()],
            done: self.is_empty(),
        }
    }
}

/// Odometer iterator over a [`Grid`].
#[derive(Debug, Clone)]
pub struct GridPoints<'a> {
    axes: &'a [Axis],
    cursor: Vec<usize>,
    done: bool,
}

impl Iterator for GridPoints<'_> {
    type Item = GridPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let coordinates = self
            .axes
            .iter()
            .zip(&self.cursor)
            .map(|(axis, &i)| (axis.name.clone(), axis.values[i].clone()))
            .collect();

        // advance, carrying from the innermost axis outwards
        self.done = true;
        for (axis, i) in self.axes.iter().zip(self.cursor.iter_mut()).rev() {
            *i += 1;
            if *i < axis.len() {
                self.done = false;
                break;
            }
            *i = 0;
        }

        Some(GridPoint { coordinates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_order_outermost_first() {
        let axes = [Axis::new("threads", [1, 2]), Axis::new("size", [10, 20, 30])];
        let grid = Grid::new(&axes);
        let rendered: Vec<String> = grid.points().map(|p| p.to_string()).collect();
        assert_eq!(grid.len(), 6);
        assert_eq!(
            rendered,
            [
                "threads=1 size=10",
                "threads=1 size=20",
                "threads=1 size=30",
                "threads=2 size=10",
                "threads=2 size=20",
                "threads=2 size=30",
            ]
        );
    }

    #[test]
    fn test_empty_axis_yields_no_points() {
        let axes = [Axis::new("threads", [1, 2]), Axis::new::<i64>("size", [])];
        let grid = Grid::new(&axes);
        assert!(grid.is_empty());
        assert_eq!(grid.points().count(), 0);
    }

    #[test]
    fn test_point_lookup() {
        let axes = [Axis::new("algorithm", ["rows"]), Axis::new("threads", [4])];
        let point = Grid::new(&axes).points().next().unwrap();
        assert_eq!(point.get("threads"), Some(&AxisValue::Int(4)));
        assert_eq!(point.get("algorithm"), Some(&AxisValue::from("rows")));
        assert_eq!(point.get("missing"), None);
    }
}
