//! Log-line decoding.
//!
//! Converts raw text lines in either of two grammars — the bracketed
//! plain-text form (`level [timestamp] message key=value ...`) and
//! one-object-per-line JSON — into structured [`LogRecord`] values.
//!
//! # Architecture
//!
//! - `model.rs`: the record type and error taxonomy
//! - `timestamp.rs`: layout-list timestamp normalization
//! - `formats/`: one decoder per grammar
//! - `scan.rs`: line-stream and file ingestion
//!
//! Decoding is stateless between lines: callers may fan lines out across
//! threads freely. A failed line yields a [`ParseError`] and never affects
//! the lines around it.

pub mod formats;
pub mod model;
pub mod scan;
pub mod timestamp;

// Re-export commonly used types
pub use model::{LogRecord, NotificationContext, ParseError, TimestampError};
pub use timestamp::parse_timestamp;

// Constants
pub const MAX_LINE_SIZE: usize = 1_048_576; // 1MB

/// Decode one raw line under whichever grammar it matches.
///
/// A trimmed line opening with `{` takes the JSON path; everything else is
/// parsed as the plain-text grammar.
pub fn decode_line(line: &str) -> Result<LogRecord, ParseError> {
    if line.len() > MAX_LINE_SIZE {
        return Err(ParseError::LineTooLarge(line.len(), MAX_LINE_SIZE));
    }

    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        formats::json::parse(trimmed)
    } else {
        formats::plain::parse(trimmed)
    }
}
