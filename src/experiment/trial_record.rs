//! Trial Result - one averaged measurement per grid point

use serde::{Deserialize, Serialize};

use super::axis::GridPoint;
use super::descriptor::{ColumnSource, ExperimentDescriptor};
use crate::{Error, Result};

/// Averaged measurement for one axis-value tuple.
///
/// `payload` holds the timing-token metadata of the final retry; `mean_time`
/// is the arithmetic mean of every retry's elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialResult {
    point: GridPoint,
    payload: Vec<String>,
    mean_time: f64,
    samples: u32,
}

impl TrialResult {
    /// Create a trial result.
    ///
    /// # Arguments
    ///
    /// * `point` - Grid point that was measured
    /// * `payload` - Metadata fields from the last run's timing token
    /// * `mean_time` - Mean elapsed seconds
    /// * `samples` - Number of runs averaged
    #[must_use]
    pub const fn new(point: GridPoint, payload: Vec<String>, mean_time: f64, samples: u32) -> Self {
        Self {
            point,
            payload,
            mean_time,
            samples,
        }
    }

    /// Grid point this result measures.
    #[must_use]
    pub const fn point(&self) -> &GridPoint {
        &self.point
    }

    /// Metadata fields, in token order.
    #[must_use]
    pub fn payload(&self) -> &[String] {
        &self.payload
    }

    /// Mean elapsed seconds.
    #[must_use]
    pub const fn mean_time(&self) -> f64 {
        self.mean_time
    }

    /// Number of runs averaged.
    #[must_use]
    pub const fn samples(&self) -> u32 {
        self.samples
    }

    /// Render this result as one persisted row, in the descriptor's column order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the payload has a different number of fields
    /// than the descriptor's payload columns, or an axis column is missing
    /// from the point.
    pub fn to_record(&self, descriptor: &ExperimentDescriptor) -> Result<Vec<String>> {
        let expected = descriptor.payload_fields().len();
        if self.payload.len() != expected {
            return Err(Error::Schema(format!(
                "{}: [{}] produced {} payload fields ({}), expected {expected} ({})",
                descriptor.name(),
                self.point,
                self.payload.len(),
                self.payload.join(","),
                descriptor.payload_fields().join(","),
            )));
        }

        let mut payload = self.payload.iter();
        descriptor
            .schema()
            .iter()
            .map(|column| match column.source() {
                ColumnSource::Axis => self
                    .point
                    .get(column.name())
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        Error::Schema(format!("[{}] has no axis '{}'", self.point, column.name()))
                    }),
                ColumnSource::Payload => payload
                    .next()
                    .cloned()
                    .ok_or_else(|| Error::Schema("payload exhausted".to_string())),
                ColumnSource::MeanTime => Ok(self.mean_time.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::ExperimentKind;

    #[test]
    fn test_pi_record_layout() {
        let descriptor = ExperimentKind::Pi.descriptor().unwrap();
        let point = descriptor.grid().points().next().unwrap();
        let result = TrialResult::new(point, vec!["3.16".into(), "100".into()], 0.25, 3);
        assert_eq!(result.to_record(&descriptor).unwrap(), ["1", "3.16", "100", "0.25"]);
    }

    #[test]
    fn test_payload_count_mismatch() {
        let descriptor = ExperimentKind::Pi.descriptor().unwrap();
        let point = descriptor.grid().points().next().unwrap();
        let result = TrialResult::new(point, vec!["3.16".into()], 0.25, 1);
        assert!(matches!(result.to_record(&descriptor), Err(Error::Schema(_))));
    }
}
