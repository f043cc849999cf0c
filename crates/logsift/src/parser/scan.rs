//! Line-stream and file ingestion.
//!
//! Decode failures are local: a bad line is skipped and counted, never
//! allowed to abort the stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::filter::RecordFilter;

use super::model::LogRecord;
use super::decode_line;

/// Decode an ordered sequence of lines into records, preserving line order.
pub fn decode_lines<I, S>(lines: I) -> Vec<LogRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for line in lines {
        match decode_line(line.as_ref()) {
            Ok(record) => records.push(record),
            Err(error) => {
                skipped += 1;
                tracing::trace!(%error, "skipping unparseable line");
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, kept = records.len(), "decoded line stream");
    }
    records
}

/// Read a log file and decode it, keeping records that pass `filter`.
pub fn scan_file(path: impl AsRef<Path>, filter: &RecordFilter) -> std::io::Result<Vec<LogRecord>> {
    let file = File::open(path.as_ref())?;
    scan_reader(BufReader::new(file), filter)
}

/// Decode a buffered line source, keeping records that pass `filter`.
pub fn scan_reader<R: BufRead>(
    reader: R,
    filter: &RecordFilter,
) -> std::io::Result<Vec<LogRecord>> {
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if let Ok(record) = decode_line(&line) {
            if filter.should_include(&record) {
                records.push(record);
            }
        }
    }

    Ok(records)
}
