//! JSON thread-sequence serializer.
//!
//! The document lists the nails the thread visits as one continuous path:
//! `thread_sequence = [from₀, to₀, to₁, …]`, so `n` lines produce `n + 1`
//! entries and no lines produce an empty list.
//!
//! ```json
//! {
//!   "nail_count": 360,
//!   "total_lines": 2,
//!   "resolution": 360,
//!   "thread_sequence": [0, 181, 17],
//!   "metrics": { "mse": 812.4, "rmse": 28.5, "coverage_percent": 63.0, "total_lines": 2, "elapsed": 0.8 }
//! }
//! ```
//!
//! `resolution` and `metrics` are optional when reading, so documents
//! carrying only `nail_count`, `total_lines` and `thread_sequence` load
//! as well.

use serde::{Deserialize, Serialize};
use strung_pipeline::{GenerationResult, LineConnection, QualityMetrics};

use crate::ExportError;

/// On-disk representation of a thread sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDocument {
    /// Number of nails on the circle.
    pub nail_count: usize,
    /// Number of lines in the sequence.
    pub total_lines: usize,
    /// Working resolution the sequence was optimized at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
    /// Nails visited, in order.
    pub thread_sequence: Vec<usize>,
    /// Quality report of the run that produced the sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
}

impl ThreadDocument {
    /// Build a document from an optimization result.
    #[must_use]
    pub fn from_result(result: &GenerationResult, resolution: u32) -> Self {
        let mut thread_sequence = Vec::with_capacity(result.line_sequence.len() + 1);
        if let Some(first) = result.line_sequence.first() {
            thread_sequence.push(first.from);
        }
        thread_sequence.extend(result.line_sequence.iter().map(|line| line.to));
        Self {
            nail_count: result.nails.len(),
            total_lines: result.line_sequence.len(),
            resolution: Some(resolution),
            thread_sequence,
            metrics: Some(result.metrics),
        }
    }

    /// Rebuild the line list from the path.
    #[must_use]
    pub fn connections(&self) -> Vec<LineConnection> {
        self.thread_sequence
            .windows(2)
            .enumerate()
            .map(|(position, pair)| LineConnection::new(pair[0], pair[1], position))
            .collect()
    }

    /// Check that every nail id is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidSequence`] for the first id that is
    /// not below `nail_count`.
    pub fn validate(&self) -> Result<(), ExportError> {
        match self
            .thread_sequence
            .iter()
            .enumerate()
            .find(|&(_, &nail)| nail >= self.nail_count)
        {
            Some((index, &nail)) => Err(ExportError::InvalidSequence {
                index,
                nail,
                nail_count: self.nail_count,
            }),
            None => Ok(()),
        }
    }
}

/// Serialize a result as a pretty-printed JSON document.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails, which happens
/// only for non-finite metrics.
pub fn to_json(result: &GenerationResult, resolution: u32) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&ThreadDocument::from_result(
        result, resolution,
    ))?)
}

/// Parse and validate a JSON document.
///
/// # Errors
///
/// Returns [`ExportError::Json`] for malformed input and
/// [`ExportError::InvalidSequence`] for out-of-range nail ids.
pub fn from_json(json: &str) -> Result<ThreadDocument, ExportError> {
    let document: ThreadDocument = serde_json::from_str(json)?;
    document.validate()?;
    Ok(document)
}
