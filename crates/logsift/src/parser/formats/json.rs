//! JSON grammar: one structured object per line.
//!
//! Each line is deserialized twice: once against the fixed schema below to
//! pull out the well-known fields, and once into a generic map so that
//! fields the schema does not declare still land in `extras`.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::parser::model::{LogRecord, NotificationContext, ParseError};
use crate::parser::timestamp::parse_timestamp;

/// Keys consumed by the fixed schema; the generic pass skips these.
const SCHEMA_FIELDS: [&str; 9] = [
    "timestamp",
    "level",
    "msg",
    "caller",
    "user_id",
    "logSource",
    "ackId",
    "type",
    "status",
];

#[derive(Debug, Deserialize)]
struct RawJsonRecord {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    caller: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(rename = "logSource", default)]
    log_source: Option<String>,
    #[serde(rename = "ackId", default)]
    ack_id: Option<String>,
    #[serde(rename = "type", default)]
    notification_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Decode one JSON line (caller has already confirmed the `{` prefix).
pub fn parse(line: &str) -> Result<LogRecord, ParseError> {
    let (raw, repaired) = match serde_json::from_str::<RawJsonRecord>(line) {
        Ok(raw) => (raw, None),
        Err(_) => {
            // One repair attempt before giving up: escaped quotes are the
            // most common mangling in captured log lines.
            let fixed = repair_escaped_quotes(line);
            let raw = serde_json::from_str::<RawJsonRecord>(&fixed)
                .map_err(|e| ParseError::InvalidFormat(format!("invalid JSON log: {e}")))?;
            (raw, Some(fixed))
        }
    };

    let extras = collect_extras(line, repaired.as_deref());

    // Timestamp failures reject the whole line even when everything else
    // decoded; a record never exists without a resolved instant.
    let timestamp = parse_timestamp(&raw.timestamp)?;

    let notification = NotificationContext {
        log_source: raw.log_source,
        ack_id: raw.ack_id,
        notification_type: raw.notification_type,
        status: raw.status,
    };

    Ok(LogRecord {
        timestamp,
        level: raw.level,
        message: raw.msg,
        source: raw.caller.filter(|caller| !caller.is_empty()),
        user: raw.user_id.filter(|user| !user.is_empty()),
        extras,
        notification: (!notification.is_empty()).then_some(notification),
        duplicate_count: 0,
    })
}

/// Replace every escaped double quote with a straight single quote.
fn repair_escaped_quotes(line: &str) -> String {
    line.replace("\\\"", "'")
}

/// Generic deserialization pass feeding `extras`. Prefers the original
/// line; falls back to the repaired form so that a line recovered by the
/// repair still gets its extra fields.
fn collect_extras(line: &str, repaired: Option<&str>) -> HashMap<String, String> {
    let map = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => Some(map),
        _ => repaired.and_then(|fixed| match serde_json::from_str::<Value>(fixed) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }),
    };

    let Some(map) = map else {
        return HashMap::new();
    };

    let mut extras = HashMap::with_capacity(map.len().saturating_sub(SCHEMA_FIELDS.len()));
    for (key, value) in map {
        if SCHEMA_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let text = match value {
            Value::String(text) => text,
            // Numbers, booleans, null, and nested structures keep their
            // compact JSON rendering.
            other => other.to_string(),
        };
        extras.insert(key, text);
    }
    extras
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::timestamp::parse_timestamp;

    #[test]
    fn test_basic_json_line() {
        let line = r#"{
            "timestamp": "2025-02-27T15:42:40.076Z",
            "level": "debug",
            "msg": "Received HTTP request",
            "caller": "web/handlers.go:187",
            "user_id": "ABC123",
            "method": "GET",
            "url": "/api/v4/groups",
            "request_id": "XYZ789",
            "err": "some error",
            "status_code": "200"
        }"#;
        let record = parse(line).unwrap();

        assert_eq!(
            record.timestamp,
            parse_timestamp("2025-02-27T15:42:40.076Z").unwrap()
        );
        assert_eq!(record.level, "debug");
        assert_eq!(record.message, "Received HTTP request");
        assert_eq!(record.source.as_deref(), Some("web/handlers.go:187"));
        assert_eq!(record.user.as_deref(), Some("ABC123"));
        assert_eq!(record.extras["method"], "GET");
        assert_eq!(record.extras["url"], "/api/v4/groups");
        assert_eq!(record.extras["request_id"], "XYZ789");
        assert_eq!(record.extras["err"], "some error");
        assert_eq!(record.extras["status_code"], "200");
        assert!(record.notification.is_none());
    }

    #[test]
    fn test_non_string_extras_rendered_as_compact_json() {
        let line = r#"{"timestamp":"2025-02-19 13:00:19.541 +01:00","level":"info","msg":"Set license","caller":"platform/license.go:392","sku_name":"Enterprise Dev","is_trial":false,"features.users":200000,"features":{"cloud":false,"mfa":true}}"#;
        let record = parse(line).unwrap();

        // Offset honored and converted to UTC.
        assert_eq!(
            record.timestamp,
            parse_timestamp("2025-02-19T12:00:19.541Z").unwrap()
        );
        assert_eq!(record.extras["sku_name"], "Enterprise Dev");
        assert_eq!(record.extras["is_trial"], "false");
        assert_eq!(record.extras["features.users"], "200000");
        assert_eq!(record.extras["features"], r#"{"cloud":false,"mfa":true}"#);
    }

    #[test]
    fn test_null_extra_rendered_as_null() {
        let line = r#"{"timestamp":"2025-02-27T15:42:40.076Z","level":"info","msg":"ok","session":null}"#;
        let record = parse(line).unwrap();
        assert_eq!(record.extras["session"], "null");
    }

    #[test]
    fn test_escaped_quotes_parse_on_first_attempt() {
        let line = r#"{"timestamp":"2025-02-27T15:42:40.076Z","level":"error","msg":"Error processing request with \"special\" characters","caller":"api/handler.go:42"}"#;
        let record = parse(line).unwrap();

        assert_eq!(record.level, "error");
        assert_eq!(
            record.message,
            r#"Error processing request with "special" characters"#
        );
        assert_eq!(record.source.as_deref(), Some("api/handler.go:42"));
        assert!(record.extras.is_empty());
    }

    #[test]
    fn test_repair_replaces_escaped_quotes() {
        assert_eq!(
            repair_escaped_quotes(r#"{"msg":"said \"hi\" twice"}"#),
            r#"{"msg":"said 'hi' twice"}"#
        );
    }

    #[test]
    fn test_invalid_json_fails_after_repair_attempt() {
        let line = r#"{"timestamp": "2025-02-27T15:42:40.076Z", "level": "debug", "msg": "incomplete json..."#;
        assert!(parse(line).is_err());
    }

    #[test]
    fn test_empty_object_fails_on_timestamp() {
        let result = parse("{}");
        assert!(matches!(result, Err(ParseError::BadTimestamp(_))));
    }

    #[test]
    fn test_notification_fields_populate_context() {
        let line = r#"{"timestamp":"2025-02-27T15:42:40.076Z","level":"info","msg":"Notification sent","logSource":"notifications","ackId":"a1","type":"message","status":"Sent","push_type":"apns"}"#;
        let record = parse(line).unwrap();

        let notification = record.notification.unwrap();
        assert_eq!(notification.log_source.as_deref(), Some("notifications"));
        assert_eq!(notification.ack_id.as_deref(), Some("a1"));
        assert_eq!(notification.notification_type.as_deref(), Some("message"));
        assert_eq!(notification.status.as_deref(), Some("Sent"));

        // Consumed by the schema, so they stay out of extras.
        assert!(!record.extras.contains_key("logSource"));
        assert!(!record.extras.contains_key("status"));
        assert_eq!(record.extras["push_type"], "apns");
    }

    #[test]
    fn test_missing_optional_fields() {
        let line = r#"{"timestamp":"2025-02-27T15:42:40.076Z","level":"info","msg":"Server started"}"#;
        let record = parse(line).unwrap();

        assert!(record.source.is_none());
        assert!(record.user.is_none());
        assert!(record.notification.is_none());
        assert!(record.extras.is_empty());
    }

    #[test]
    fn test_bad_timestamp_rejects_line() {
        let line = r#"{"timestamp":"around noon","level":"info","msg":"ok","key":"value"}"#;
        assert!(matches!(parse(line), Err(ParseError::BadTimestamp(_))));
    }
}
