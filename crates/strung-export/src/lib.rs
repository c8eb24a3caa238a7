//! strung-export: Pure format serializers (sans-IO)
//!
//! Converts optimization results into output formats: the JSON thread
//! sequence a builder follows nail by nail, and a grayscale PNG preview
//! of the accumulated thread. Every function returns bytes or strings;
//! writing them to disk is the caller's job.

pub mod json;
pub mod png;

pub use json::{ThreadDocument, from_json, to_json};
pub use png::{render, to_png};

/// Errors produced while serializing or parsing export formats.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encoding failed.
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// A thread sequence refers to a nail that does not exist.
    #[error("thread_sequence[{index}] = {nail} is out of range for {nail_count} nails")]
    InvalidSequence {
        /// Position in `thread_sequence`.
        index: usize,
        /// Offending nail id.
        nail: usize,
        /// Declared nail count.
        nail_count: usize,
    },
}
