use chrono::{DateTime, NaiveDateTime, Utc};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

use crate::parser::model::{LogRecord, TimestampError};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),
}

/// Criteria for keeping a decoded record. All present criteria must match.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Exact severity label, case-insensitive.
    pub level: Option<String>,
    /// Substring of the acting user, case-insensitive.
    pub user: Option<String>,
    /// Free-text substring over message, source, and extras,
    /// case-insensitive.
    pub search: Option<String>,
    /// Regex over message, source, user, and extras.
    pub pattern: Option<String>,
    /// Inclusive time-range bounds.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub struct RecordFilter {
    level: Option<String>,
    user: Option<String>,
    search: Option<String>,
    matcher: Option<RegexMatcher>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn new(options: FilterOptions) -> Result<Self, FilterError> {
        let matcher = options
            .pattern
            .as_deref()
            .map(|pattern| {
                RegexMatcherBuilder::new()
                    .multi_line(false)
                    .build(pattern)
                    .map_err(|e| FilterError::InvalidRegex(e.to_string()))
            })
            .transpose()?;

        Ok(Self {
            level: options.level,
            user: options.user.map(|user| user.to_lowercase()),
            search: options.search.map(|term| term.to_lowercase()),
            matcher,
            start: options.start,
            end: options.end,
        })
    }

    /// Filter that keeps everything.
    pub fn all() -> Self {
        Self {
            level: None,
            user: None,
            search: None,
            matcher: None,
            start: None,
            end: None,
        }
    }

    pub fn should_include(&self, record: &LogRecord) -> bool {
        if let Some(level) = &self.level {
            if !record.level.eq_ignore_ascii_case(level) {
                return false;
            }
        }

        if let Some(user) = &self.user {
            let record_user = record.user.as_deref().unwrap_or("").to_lowercase();
            if !record_user.contains(user.as_str()) {
                return false;
            }
        }

        if let Some(start) = self.start {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp > end {
                return false;
            }
        }

        if let Some(term) = &self.search {
            if !self.search_matches(record, term) {
                return false;
            }
        }

        if let Some(matcher) = &self.matcher {
            if !self.regex_matches(matcher, record) {
                return false;
            }
        }

        true
    }

    fn search_matches(&self, record: &LogRecord, term: &str) -> bool {
        if record.message.to_lowercase().contains(term) {
            return true;
        }
        if record.source_str().to_lowercase().contains(term) {
            return true;
        }
        record
            .extras
            .iter()
            .any(|(key, value)| {
                key.to_lowercase().contains(term) || value.to_lowercase().contains(term)
            })
    }

    fn regex_matches(&self, matcher: &RegexMatcher, record: &LogRecord) -> bool {
        let is_match = |text: &str| matcher.is_match(text.as_bytes()).unwrap_or(false);

        is_match(&record.message)
            || is_match(record.source_str())
            || is_match(record.user.as_deref().unwrap_or(""))
            || record
                .extras
                .iter()
                .any(|(key, value)| is_match(key) || is_match(value))
    }
}

/// Parse a filter boundary timestamp.
///
/// Accepts the `2025-01-01T10:00:00` form and the space-separated form with
/// optional fractional seconds; both are taken as UTC.
pub fn parse_filter_time(text: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = text.trim();
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(naive.and_utc());
        }
    }
    Err(TimestampError(trimmed.to_string()))
}
