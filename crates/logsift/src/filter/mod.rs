//! Record filtering applied during ingestion.

pub mod engine;

pub use engine::{parse_filter_time, FilterError, FilterOptions, RecordFilter};
