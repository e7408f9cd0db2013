//! The dated records a run produces
//!
//! A stats run yields one [`StatsRecord`] per calendar date; an event run yields one
//! [`EventRecord`]. Both are built by pure functions ([`normalize`] and
//! [`record_event`]) that perform no I/O, so they can be exercised without a hosting
//! API, a code counter or a store.

mod event_record;
mod normalize;
mod stats_record;

pub use event_record::{EventRecord, record_event};
pub use normalize::{HostingCounts, normalize};
pub use stats_record::StatsRecord;
