use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// No known layout matched the timestamp text.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unable to parse timestamp: {0}")]
pub struct TimestampError(pub String);

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Line too large: {0} bytes (max: {1} bytes)")]
    LineTooLarge(usize, usize),

    #[error("Bad timestamp: {0}")]
    BadTimestamp(#[from] TimestampError),
}

/// One decoded log entry.
///
/// Constructed immutably by the line decoders; the deduplication engine
/// emits shallow copies with `duplicate_count` populated and never mutates
/// records in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Always a fully-resolved UTC instant. A line whose timestamp cannot
    /// be parsed is rejected, never admitted with a sentinel time.
    pub timestamp: DateTime<Utc>,

    /// Severity label, case-preserved as found; compared case-insensitively.
    pub level: String,

    /// Free-text description with structured fields removed.
    pub message: String,

    /// Call-site identifier (file:line or equivalent), when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Acting user/account identifier, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Every field not otherwise recognized. Always present (possibly
    /// empty) so callers can iterate unconditionally; duplicate keys in the
    /// source collapse last-writer-wins.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub extras: HashMap<String, String>,

    /// Notification-log fields, absent for ordinary entries. Flattened on
    /// serialization, so a `None` context emits nothing.
    #[serde(flatten)]
    pub notification: Option<NotificationContext>,

    /// 0 = not yet deduplicated; after deduplication, the cluster size
    /// (>= 1, the record itself included).
    #[serde(skip_serializing_if = "count_is_unset")]
    pub duplicate_count: u64,
}

fn count_is_unset(count: &u64) -> bool {
    *count == 0
}

impl LogRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level: level.into(),
            message: message.into(),
            source: None,
            user: None,
            extras: HashMap::new(),
            notification: None,
            duplicate_count: 0,
        }
    }

    /// Source as a comparable string; records without one compare as "".
    pub fn source_str(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }
}

/// Fields specific to the notification log variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationContext {
    #[serde(rename = "logSource", skip_serializing_if = "Option::is_none")]
    pub log_source: Option<String>,

    #[serde(rename = "ackId", skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,

    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl NotificationContext {
    pub fn is_empty(&self) -> bool {
        self.log_source.is_none()
            && self.ack_id.is_none()
            && self.notification_type.is_none()
            && self.status.is_none()
    }
}
