//! Plain-text grammar: `level [timestamp] message key=value ...`

use std::collections::HashMap;

use crate::parser::model::{LogRecord, ParseError};
use crate::parser::timestamp::parse_timestamp;

/// Decode one plain-text line.
///
/// The line splits on the first `" ["` into a level token and a remainder,
/// and the remainder on the first `"] "` into the timestamp text and the
/// payload. Payload tokens before the first `=`-bearing token form the
/// message; everything after is key/value data.
pub fn parse(line: &str) -> Result<LogRecord, ParseError> {
    let (level_token, rest) = line
        .split_once(" [")
        .ok_or_else(|| ParseError::InvalidFormat("missing bracketed timestamp".to_string()))?;

    let level = level_token.trim();
    if level.is_empty() {
        return Err(ParseError::InvalidFormat("empty level token".to_string()));
    }

    let (timestamp_text, payload) = rest
        .split_once("] ")
        .ok_or_else(|| ParseError::InvalidFormat("unterminated timestamp bracket".to_string()))?;

    let timestamp = parse_timestamp(timestamp_text)?;

    let mut tokens = payload.split_whitespace().peekable();

    let mut message_words: Vec<&str> = Vec::new();
    while let Some(&token) = tokens.peek() {
        if token.contains('=') {
            break;
        }
        message_words.push(token);
        tokens.next();
    }
    let message = message_words.join(" ");

    let mut source = None;
    let mut user = None;
    let mut extras = HashMap::new();

    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| {
                ParseError::InvalidFormat(format!("malformed key/value token: {token}"))
            })?;

        match key {
            "caller" => source = Some(strip_quotes(value).to_string()),
            "user_id" => user = Some(value.to_string()),
            _ => {
                extras.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(LogRecord {
        timestamp,
        level: level.to_string(),
        message,
        source,
        user,
        extras,
        notification: None,
        duplicate_count: 0,
    })
}

/// Strip one layer of surrounding double quotes, if both are present.
fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
