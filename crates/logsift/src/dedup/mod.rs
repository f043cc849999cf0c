//! Near-duplicate collapsing for decoded log records.
//!
//! Messages are canonicalized into placeholder templates (`normalize`),
//! compared with a layered cheap-to-expensive scorer (`similarity`), and
//! clustered per severity level by the engine (`engine`), sequentially or
//! across worker threads depending on input size. Each cluster survives as
//! its first record, carrying the cluster size in `duplicate_count`.

pub mod engine;
pub mod normalize;
pub mod similarity;

pub use engine::{dedup_records, Deduplicator, NullProgress, ProgressSink};
pub use normalize::normalize_message;
