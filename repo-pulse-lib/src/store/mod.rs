//! Date-partitioned persistence for stats and event records
//!
//! Stats records are upserted: one calendar date maps to at most one document, and a
//! later write for the same date replaces the earlier one. Event records are appended
//! and never replaced.
//!
//! [`DocumentStore`] is the seam the pipeline writes through. [`FileStore`] keeps JSON
//! documents on disk, [`MemoryStore`] keeps them in process.

mod collection_lock;
mod file_store;
mod memory_store;

use crate::error::Result;
use crate::records::{EventRecord, StatsRecord};
use chrono::NaiveDate;
use core::fmt::Debug;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

const LOG_TARGET: &str = "     store";

/// Names of the two logical collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub stats: String,
    pub events: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            stats: "stats".to_string(),
            events: "events".to_string(),
        }
    }
}

/// A store holding the stats and event records of one repository.
///
/// Every method is blocking; async callers run them on the blocking thread pool.
pub trait DocumentStore: Send + Sync + Debug {
    /// The collection names this store writes to.
    fn collections(&self) -> &Collections;

    /// Insert the record for `record.date`, replacing any record already stored for that date.
    fn upsert_stats(&self, record: &StatsRecord) -> Result<()>;

    /// Add an event. Existing events are never touched.
    fn append_event(&self, record: &EventRecord) -> Result<()>;

    /// The stats record for `date`, if any.
    fn get_stats(&self, date: NaiveDate) -> Result<Option<StatsRecord>>;

    /// All stats records, oldest first.
    fn list_stats(&self) -> Result<Vec<StatsRecord>>;

    /// Events recorded for `date`, in insertion order.
    fn events_on(&self, date: NaiveDate) -> Result<Vec<EventRecord>>;

    /// All events, oldest date first and in insertion order within a date.
    fn list_events(&self) -> Result<Vec<EventRecord>>;
}
