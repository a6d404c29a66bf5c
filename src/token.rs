//! Timing token protocol
//!
//! A program under test prints arbitrary text and, somewhere in it, one
//! token of the form
//!
//! ```text
//! token       := '|' payload_csv '|'
//! payload_csv := (field ',')* elapsed_time
//! ```
//!
//! The whole captured stdout is treated as one buffer: the payload is the
//! text strictly between the **first** and the **last** `|`. Every field
//! before the final one is opaque metadata; the final field is the elapsed
//! wall-clock time of that run in seconds.
//!
//! Elapsed must be a finite, non-negative number: `-1`, `NaN` and `inf`
//! parse as floats but are rejected with [`TokenError::InvalidElapsed`].
//!
//! ```rust
//! use sweep_bench::token::TimingToken;
//!
//! let token = TimingToken::parse("junk|3,0.125|trailing")?;
//! assert_eq!(token.metadata(), ["3"]);
//! assert!((token.elapsed() - 0.125).abs() < f64::EPSILON);
//! # Ok::<(), sweep_bench::token::TokenError>(())
//! ```

use thiserror::Error;

/// Payload delimiter
pub const DELIMITER: char = '|';

/// Field separator inside the payload
pub const SEPARATOR: char = ',';

/// Reasons a program's output does not carry a valid token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No `|` anywhere in the output
    #[error("no '|' delimiter in program output")]
    MissingDelimiter,

    /// Only one `|`, so the payload is never closed
    #[error("timing token opened with '|' but never closed")]
    UnterminatedPayload,

    /// Nothing between the delimiters
    #[error("timing token payload is empty")]
    EmptyPayload,

    /// Last field is not a finite, non-negative float
    #[error("elapsed time {0:?} is not a valid non-negative number")]
    InvalidElapsed(String),
}

/// One parsed timing token.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingToken {
    metadata: Vec<String>,
    elapsed: f64,
}

impl TimingToken {
    /// Extract the token from a program's complete standard output.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing which part of the grammar failed.
    pub fn parse(output: &str) -> Result<Self, TokenError> {
        let open = output.find(DELIMITER).ok_or(TokenError::MissingDelimiter)?;
        let close = output.rfind(DELIMITER).ok_or(TokenError::MissingDelimiter)?;
        if open == close {
            return Err(TokenError::UnterminatedPayload);
        }

        let payload = &output[open + DELIMITER.len_utf8()..close];
        if payload.trim().is_empty() {
            return Err(TokenError::EmptyPayload);
        }

        let (metadata, raw_elapsed) = match payload.rfind(SEPARATOR) {
            Some(split) => (
                payload[..split].split(SEPARATOR).map(str::to_string).collect(),
                &payload[split + SEPARATOR.len_utf8()..],
            ),
            None => (Vec::new(), payload),
        };

        let trimmed = raw_elapsed.trim();
        let elapsed = trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or_else(|| TokenError::InvalidElapsed(trimmed.to_string()))?;

        Ok(Self { metadata, elapsed })
    }

    /// Opaque metadata fields, in output order.
    #[must_use]
    pub fn metadata(&self) -> &[String] {
        &self.metadata
    }

    /// Metadata joined back into its wire form.
    #[must_use]
    pub fn metadata_csv(&self) -> String {
        self.metadata.join(",")
    }

    /// Elapsed wall-clock time of the run, in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Consume the token, returning its metadata fields.
    #[must_use]
    pub fn into_metadata(self) -> Vec<String> {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pi_output() {
        let out = "rank 0 ready\n|3.141593,1000000,0.052311|\n";
        let token = TimingToken::parse(out).unwrap();
        assert_eq!(token.metadata(), ["3.141593", "1000000"]);
        assert!((token.elapsed() - 0.052_311).abs() < f64::EPSILON);
    }

    #[test]
    fn test_payload_spans_first_to_last_delimiter() {
        let token = TimingToken::parse("a|x|y,1.5|b").unwrap();
        assert_eq!(token.metadata(), ["x|y"]);
    }

    #[test]
    fn test_elapsed_only_payload() {
        let token = TimingToken::parse("|0.25|").unwrap();
        assert!(token.metadata().is_empty());
        assert_eq!(token.metadata_csv(), "");
    }

    #[test]
    fn test_errors() {
        assert_eq!(TimingToken::parse("no token"), Err(TokenError::MissingDelimiter));
        assert_eq!(TimingToken::parse("half|1,2"), Err(TokenError::UnterminatedPayload));
        assert_eq!(TimingToken::parse("| |"), Err(TokenError::EmptyPayload));
        assert_eq!(
            TimingToken::parse("|1,abc|"),
            Err(TokenError::InvalidElapsed("abc".to_string()))
        );
        assert_eq!(
            TimingToken::parse("|1,-0.5|"),
            Err(TokenError::InvalidElapsed("-0.5".to_string()))
        );
        assert!(matches!(
            TimingToken::parse("|1,NaN|"),
            Err(TokenError::InvalidElapsed(_))
        ));
    }
}
