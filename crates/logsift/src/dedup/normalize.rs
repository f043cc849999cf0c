//! Message canonicalization.
//!
//! Variable substrings (ids, dates, addresses, durations, quoted literals)
//! collapse into fixed placeholder tags so that two renderings of the same
//! event compare equal. Normalization is pure and idempotent: running it
//! over its own output is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;

/// Replacement pipeline, applied in order. Order is significant: the
/// specific patterns (long hex ids, UUIDs) must run before the coarse
/// numeric/hex fallbacks that would otherwise consume them partially.
static PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b[0-9a-f]{8}\b", "ID_SHORT"),
        (r"\b[0-9a-f]{32}\b", "ID_LONG"),
        (r"\b[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}\b", "UUID"),
        (r"\b([0-9a-f]{6,31})\b", "ID"),
        (r"\d{4}[-/]\d{1,2}[-/]\d{1,2}", "DATE"),
        (r"\d{1,2}[-/]\d{1,2}[-/]\d{2,4}", "DATE"),
        (r"\d{1,2}:\d{1,2}(:\d{1,2})?(\.\d+)?", "TIME"),
        (r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}", "IP"),
        (r"(([0-9a-f]{1,4}:){7}|::)[0-9a-f]{1,4}", "IPV6"),
        (r"\d+(\.\d+)?ms", "DURATION_MS"),
        (r"\d+(\.\d+)?s", "DURATION_S"),
        (r"\d+(\.\d+)?ns", "DURATION_NS"),
        (r"\d+(\.\d+)?[mu]s", "DURATION_US"),
        (r"\b\d{1,9}\b", "NUMBER"),
        (r#""[^"]*""#, "STRING"),
        (r"'[^']*'", "STRING"),
        (r"\b([a-zA-Z0-9_-]+\.)+[a-zA-Z0-9_-]+\b", "PATH"),
        (r"\b\d+\.\d+\.\d+\b", "VERSION"),
    ]
    .into_iter()
    .map(|(pattern, tag)| (Regex::new(pattern).expect("static pattern"), tag))
    .collect()
});

/// Placeholder words already present in the input survive lower-casing, so
/// normalizing an already-normalized message changes nothing. Longer
/// alternatives sit first so e.g. `IPV6` is not read as `IP`.
static TAG_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(ID_SHORT|ID_LONG|DURATION_MS|DURATION_US|DURATION_NS|DURATION_S|UUID|IPV6|IP|ID|DATE|TIME|NUMBER|STRING|PATH|VERSION)\b",
    )
    .expect("static pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Canonicalize a message for similarity comparison.
pub fn normalize_message(message: &str) -> String {
    let mut normalized = lowercase_keeping_tags(message);

    for (pattern, tag) in PATTERNS.iter() {
        normalized = pattern.replace_all(&normalized, *tag).into_owned();
    }

    WHITESPACE.replace_all(&normalized, " ").trim().to_string()
}

fn lowercase_keeping_tags(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut last = 0;

    for found in TAG_WORDS.find_iter(message) {
        out.push_str(&message[last..found.start()].to_lowercase());
        out.push_str(found.as_str());
        last = found.end();
    }
    out.push_str(&message[last..].to_lowercase());
    out
}
