//! Clustering of near-duplicate records.
//!
//! Records are only ever compared within a severity level and between
//! similar-enough sources; the surviving representative of each cluster is
//! the first record encountered in input order, carrying the cluster size
//! in `duplicate_count`.
//!
//! Two execution strategies, selected purely by input size:
//!
//! - sequential: in-order scan with a claimed arena and a bounded cache of
//!   normalized messages;
//! - parallel: all messages normalized up front by a worker pool, then one
//!   task per large level group. Tasks share the result list, the claimed
//!   arena, and the removed counter, each behind its own lock; all
//!   similarity work runs unlocked.
//!
//! Within a level group representatives keep input order. Across groups the
//! parallel path emits in whatever order tasks finish; consumers re-sort by
//! timestamp downstream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::DedupConfig;
use crate::parser::model::LogRecord;

use super::normalize::normalize_message;
use super::similarity::{is_similar_message, string_similarity};

/// Receives periodic progress updates from the engine.
///
/// Implementations typically drive a terminal progress display. The engine
/// logs and discards any error they return; the side channel can never fail
/// a deduplication run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, processed: usize, total: usize, removed: usize) -> std::io::Result<()>;
}

/// Sink that swallows every update.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _processed: usize, _total: usize, _removed: usize) -> std::io::Result<()> {
        Ok(())
    }
}

/// How often (in records) progress is pushed to the sink.
const REPORT_INTERVAL: usize = 10;

/// Collapse near-duplicates with the given configuration; convenience
/// wrapper over [`Deduplicator`].
pub fn dedup_records(
    records: &[LogRecord],
    config: &DedupConfig,
    progress: &dyn ProgressSink,
) -> Vec<LogRecord> {
    Deduplicator::new(config, progress).dedup(records)
}

pub struct Deduplicator<'a> {
    config: &'a DedupConfig,
    progress: &'a dyn ProgressSink,
}

impl<'a> Deduplicator<'a> {
    pub fn new(config: &'a DedupConfig, progress: &'a dyn ProgressSink) -> Self {
        Self { config, progress }
    }

    /// Return one representative per cluster of mutually similar records.
    ///
    /// Never fails; empty input yields empty output. Input records are not
    /// mutated — survivors are fresh copies with `duplicate_count` set.
    pub fn dedup(&self, records: &[LogRecord]) -> Vec<LogRecord> {
        if records.len() >= self.config.parallel_cutoff {
            tracing::debug!(total = records.len(), "deduplicating on the parallel path");
            self.dedup_parallel(records)
        } else {
            self.dedup_sequential(records)
        }
    }

    // ── sequential path ─────────────────────────────────────────

    fn dedup_sequential(&self, records: &[LogRecord]) -> Vec<LogRecord> {
        let total = records.len();
        let mut result = Vec::new();
        let mut claimed = vec![false; total];
        let mut removed = 0usize;

        // Normalized messages by input index. Entries behind the scan
        // position belong to already-claimed records and are swept out
        // periodically to bound memory.
        let mut cache: HashMap<usize, String> = HashMap::new();

        for i in 0..total {
            if i % REPORT_INTERVAL == 0 {
                self.report_progress(i, total, removed);
            }
            if i % self.config.cache_eviction_interval == 0 {
                cache.retain(|&index, _| index >= i);
            }
            if claimed[i] {
                continue;
            }
            claimed[i] = true;

            let mut representative = records[i].clone();
            representative.duplicate_count = 1;

            let base = cache
                .remove(&i)
                .unwrap_or_else(|| normalize_message(&records[i].message));
            let base_words: Vec<&str> = base.split_whitespace().collect();

            for j in (i + 1)..total {
                if claimed[j] {
                    continue;
                }
                if !self.eligible(&records[i], &records[j]) {
                    continue;
                }

                let candidate = cache
                    .entry(j)
                    .or_insert_with(|| normalize_message(&records[j].message));

                if is_similar_message(&base, candidate, &base_words, self.config.similarity_threshold)
                {
                    claimed[j] = true;
                    removed += 1;
                    representative.duplicate_count += 1;
                }
            }

            result.push(representative);
        }

        self.report_progress(total, total, removed);
        result
    }

    // ── parallel path ───────────────────────────────────────────

    fn dedup_parallel(&self, records: &[LogRecord]) -> Vec<LogRecord> {
        let total = records.len();
        let normalized = self.normalize_all(records);

        // Group indices by level, preserving input order within each group.
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            groups.entry(record.level.to_lowercase()).or_default().push(i);
        }

        let result = Mutex::new(Vec::with_capacity(groups.len()));
        let claimed = Mutex::new(vec![false; total]);
        let removed = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            let normalized = &normalized;
            let result = &result;
            let claimed = &claimed;
            let removed = &removed;
            let processed = &processed;

            for indices in groups.values() {
                if indices.len() < self.config.inline_cutoff {
                    // Not worth the dispatch overhead.
                    self.dedup_group(
                        indices, records, normalized, result, claimed, removed, processed, total,
                    );
                } else {
                    scope.spawn(move || {
                        self.dedup_group(
                            indices, records, normalized, result, claimed, removed, processed,
                            total,
                        );
                    });
                }
            }
        });

        self.report_progress(total, total, removed.load(Ordering::Relaxed));
        into_inner(result)
    }

    /// Normalize every message up front across a fixed worker pool. Workers
    /// drain a shared index counter and store into a lock-guarded slice.
    fn normalize_all(&self, records: &[LogRecord]) -> Vec<String> {
        let total = records.len();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(total.max(1));

        let slots: Mutex<Vec<Option<String>>> = Mutex::new(vec![None; total]);
        let next = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= total {
                        break;
                    }
                    let message = normalize_message(&records[i].message);
                    lock(&slots)[i] = Some(message);
                });
            }
        });

        into_inner(slots)
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect()
    }

    /// Cluster one level group. Indices arrive in input order and no other
    /// task touches them, but the three shared structures stay behind their
    /// own locks with the similarity work outside every critical section.
    #[allow(clippy::too_many_arguments)]
    fn dedup_group(
        &self,
        indices: &[usize],
        records: &[LogRecord],
        normalized: &[String],
        result: &Mutex<Vec<LogRecord>>,
        claimed: &Mutex<Vec<bool>>,
        removed: &AtomicUsize,
        processed: &AtomicUsize,
        total: usize,
    ) {
        for (position, &i) in indices.iter().enumerate() {
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % REPORT_INTERVAL == 0 {
                self.report_progress(done, total, removed.load(Ordering::Relaxed));
            }

            if lock(claimed)[i] {
                continue;
            }
            lock(claimed)[i] = true;

            let mut representative = records[i].clone();
            representative.duplicate_count = 1;

            let base = &normalized[i];
            let base_words: Vec<&str> = base.split_whitespace().collect();

            for &j in &indices[position + 1..] {
                if lock(claimed)[j] {
                    continue;
                }
                if !self.source_similar(records[i].source_str(), records[j].source_str()) {
                    continue;
                }
                if is_similar_message(
                    base,
                    &normalized[j],
                    &base_words,
                    self.config.similarity_threshold,
                ) {
                    lock(claimed)[j] = true;
                    removed.fetch_add(1, Ordering::Relaxed);
                    representative.duplicate_count += 1;
                }
            }

            lock(result).push(representative);
        }
    }

    // ── shared pre-filters ──────────────────────────────────────

    /// Cheap gate run before any message comparison.
    fn eligible(&self, a: &LogRecord, b: &LogRecord) -> bool {
        a.level.eq_ignore_ascii_case(&b.level)
            && self.source_similar(a.source_str(), b.source_str())
    }

    fn source_similar(&self, a: &str, b: &str) -> bool {
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        !a.is_empty()
            && !b.is_empty()
            && string_similarity(a, b) > self.config.source_similarity_threshold
    }

    fn report_progress(&self, processed: usize, total: usize, removed: usize) {
        if let Err(error) = self.progress.report(processed, total, removed) {
            tracing::warn!(%error, "progress sink failed");
        }
    }
}

/// Lock a mutex, riding over poisoning: a panicked worker must not turn an
/// infallible transformation into one that panics on the caller's thread.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupConfig;
    use crate::parser::scan::decode_lines;
    use chrono::{TimeZone, Utc};

    fn record(level: &str, source: &str, message: &str) -> LogRecord {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap();
        let mut rec = LogRecord::new(ts, level, message);
        if !source.is_empty() {
            rec.source = Some(source.to_string());
        }
        rec
    }

    fn sequential_config() -> DedupConfig {
        DedupConfig::default()
    }

    fn parallel_config() -> DedupConfig {
        // Force the parallel path regardless of input size.
        DedupConfig {
            parallel_cutoff: 1,
            inline_cutoff: 2,
            ..DedupConfig::default()
        }
    }

    fn dedup(records: &[LogRecord], config: &DedupConfig) -> Vec<LogRecord> {
        dedup_records(records, config, &NullProgress)
    }

    fn counts(records: &[LogRecord]) -> Vec<u64> {
        let mut counts: Vec<u64> = records.iter().map(|r| r.duplicate_count).collect();
        counts.sort_unstable();
        counts
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup(&[], &sequential_config()).is_empty());
    }

    #[test]
    fn test_single_record() {
        let records = vec![record("info", "a.go:1", "System check complete")];
        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].duplicate_count, 1);
        // The input is untouched.
        assert_eq!(records[0].duplicate_count, 0);
    }

    #[test]
    fn test_three_identical_lines_collapse() {
        let line = r#"info [2025-01-01 11:00:00.000 Z] System check complete caller="system/checks.go:42" status="ok""#;
        let records = decode_lines([line, line, line]);
        assert_eq!(records.len(), 3);

        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].duplicate_count, 3);
        assert_eq!(output[0].message, "System check complete");
    }

    #[test]
    fn test_variable_data_still_merges() {
        let records = vec![
            record("info", "web/req.go:10", "Request 111 finished in 12ms"),
            record("info", "web/req.go:10", "Request 222 finished in 98ms"),
            record("info", "web/req.go:10", "Request 333 finished in 4ms"),
        ];
        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].duplicate_count, 3);
        // The representative is the first record of the cluster.
        assert_eq!(output[0].message, "Request 111 finished in 12ms");
    }

    #[test]
    fn test_levels_never_merge() {
        let records = vec![
            record("info", "a.go:1", "Disk usage at 85 percent"),
            record("warn", "a.go:1", "Disk usage at 86 percent"),
            record("INFO", "a.go:1", "Disk usage at 99 percent"),
        ];
        let output = dedup(&records, &sequential_config());

        // info and INFO merge (case-insensitive); warn stays apart.
        assert_eq!(output.len(), 2);
        assert_eq!(counts(&output), vec![1, 2]);
    }

    #[test]
    fn test_dissimilar_sources_never_merge() {
        let records = vec![
            record("error", "web/handlers.go:187", "Connection timed out"),
            record("error", "store/sql_channel.rs:9", "Connection timed out"),
        ];
        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn test_near_identical_sources_merge() {
        // Same file, neighboring lines: source similarity above 0.7.
        let records = vec![
            record("error", "web/handlers.go:187", "Connection timed out"),
            record("error", "web/handlers.go:204", "Connection timed out"),
        ];
        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].duplicate_count, 2);
    }

    #[test]
    fn test_absent_sources_compare_equal() {
        let records = vec![
            record("info", "", "Heartbeat received"),
            record("info", "", "Heartbeat received"),
        ];
        let output = dedup(&records, &sequential_config());
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].duplicate_count, 2);
    }

    #[test]
    fn test_counts_sum_to_input_size() {
        let mut records = Vec::new();
        for i in 0..40 {
            let level = if i % 2 == 0 { "info" } else { "error" };
            records.push(record(
                level,
                "job/worker.go:77",
                &format!("Worker {i} picked up batch {}", i * 3),
            ));
        }
        let output = dedup(&records, &sequential_config());
        let sum: u64 = output.iter().map(|r| r.duplicate_count).sum();
        assert_eq!(sum, records.len() as u64);
    }

    #[test]
    fn test_sequential_keeps_input_order() {
        let records = vec![
            record("info", "a.go:1", "alpha event stream opened"),
            record("error", "b.go:2", "bravo network unreachable"),
            record("info", "a.go:1", "alpha event stream opened"),
            record("warn", "c.go:3", "charlie disk pressure rising"),
        ];
        let output = dedup(&records, &sequential_config());
        let messages: Vec<&str> = output.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "alpha event stream opened",
                "bravo network unreachable",
                "charlie disk pressure rising"
            ]
        );
    }

    #[test]
    fn test_parallel_matches_sequential_counts() {
        let mut records = Vec::new();
        for i in 0..60 {
            let (level, source, message) = match i % 4 {
                0 => ("info", "web/req.go:10", format!("Request {i} finished in {i}ms")),
                1 => ("error", "net/conn.go:55", format!("Connection {i} reset by peer")),
                2 => ("info", "auth/login.go:31", format!("User {i} logged in from 10.0.0.{i}")),
                _ => ("debug", "cache/store.go:8", format!("Cache key {i} evicted after {i}ms")),
            };
            records.push(record(level, source, &message));
        }

        let sequential = dedup(&records, &sequential_config());
        let parallel = dedup(&records, &parallel_config());

        // Same clusters, possibly different output order across groups.
        assert_eq!(counts(&sequential), counts(&parallel));
        let sum: u64 = parallel.iter().map(|r| r.duplicate_count).sum();
        assert_eq!(sum, records.len() as u64);
    }

    #[test]
    fn test_parallel_small_groups_run_inline() {
        // Every level group is below the inline cutoff: the parallel path
        // must still produce correct clusters without spawning tasks.
        let config = DedupConfig {
            parallel_cutoff: 1,
            inline_cutoff: 100,
            ..DedupConfig::default()
        };
        let records = vec![
            record("info", "a.go:1", "alpha stream opened"),
            record("info", "a.go:1", "alpha stream opened"),
            record("warn", "b.go:2", "bravo pressure rising"),
        ];
        let output = dedup(&records, &config);
        assert_eq!(counts(&output), vec![1, 2]);
    }

    #[test]
    fn test_parallel_preserves_order_within_level_group() {
        let records = vec![
            record("info", "a.go:1", "alpha stream opened for tenant one"),
            record("info", "b.go:2", "completely different startup banner text"),
            record("info", "a.go:1", "alpha stream opened for tenant two"),
        ];
        let output = dedup(&records, &parallel_config());

        // One level group, so even the parallel path keeps input order.
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].message, "alpha stream opened for tenant one");
        assert_eq!(output[0].duplicate_count, 2);
    }

    // ── progress sink ───────────────────────────────────────────

    struct RecordingSink(Mutex<Vec<(usize, usize, usize)>>);

    impl ProgressSink for RecordingSink {
        fn report(&self, processed: usize, total: usize, removed: usize) -> std::io::Result<()> {
            self.0.lock().unwrap().push((processed, total, removed));
            Ok(())
        }
    }

    struct FailingSink;

    impl ProgressSink for FailingSink {
        fn report(&self, _: usize, _: usize, _: usize) -> std::io::Result<()> {
            Err(std::io::Error::other("display went away"))
        }
    }

    #[test]
    fn test_progress_reported() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        let records: Vec<LogRecord> = (0..25)
            .map(|i| record("info", "a.go:1", &format!("unique event number {i} alpha")))
            .collect();

        dedup_records(&records, &sequential_config(), &sink);

        let reports = sink.0.into_inner().unwrap();
        assert!(!reports.is_empty());
        // Final report covers the whole input.
        assert_eq!(reports.last().unwrap().0, 25);
        assert_eq!(reports.last().unwrap().1, 25);
    }

    #[test]
    fn test_failing_sink_never_propagates() {
        let records = vec![
            record("info", "a.go:1", "alpha stream opened"),
            record("info", "a.go:1", "alpha stream opened"),
        ];

        let output = dedup_records(&records, &sequential_config(), &FailingSink);
        assert_eq!(output.len(), 1);

        let output = dedup_records(&records, &parallel_config(), &FailingSink);
        assert_eq!(output.len(), 1);
    }
}
