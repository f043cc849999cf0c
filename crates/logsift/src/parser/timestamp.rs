//! Timestamp normalization across the textual layouts seen in the wild.
//!
//! A fixed, ordered list of layouts is tried top-to-bottom so that a string
//! satisfying more than one layout always resolves the same way. Offsets are
//! honored when the text carries them; nothing is inferred beyond that, and
//! every successful parse lands in UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::model::TimestampError;

/// Zone-name suffixes accepted on the space-separated layout. Only names
/// that unambiguously mean UTC; anything else must spell out an offset.
const UTC_SUFFIXES: [&str; 3] = ["Z", "UTC", "GMT"];

/// Numeric-offset variants of the space-separated layout.
const OFFSET_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Parse a trimmed timestamp substring into a UTC instant.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TimestampError(text.to_string()));
    }

    // RFC 3339, with or without sub-second precision.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    // "2025-02-27 15:42:40.076 Z" and friends: named UTC suffix.
    for suffix in UTC_SUFFIXES {
        if let Some(rest) = trimmed.strip_suffix(suffix) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(rest.trim_end(), "%Y-%m-%d %H:%M:%S%.f")
            {
                return Ok(naive.and_utc());
            }
        }
    }

    // "2025-02-19 13:00:19.541 +01:00": numeric offset, converted to UTC.
    for layout in OFFSET_LAYOUTS {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, layout) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    // "2025/02/27 15:42:40": slash-delimited, no zone information.
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y/%m/%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    Err(TimestampError(trimmed.to_string()))
}
