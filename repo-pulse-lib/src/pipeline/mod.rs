//! Run orchestration
//!
//! A run is either a stats run (fetch every metric, normalize, upsert) or an event
//! run (validate a description, append). [`Orchestrator`] sequences the stages, applies
//! the [`MetricPolicy`] to partial failures, and writes to the store exactly once.
//!
//! Progress through a run is tracked as a [`RunState`]:
//!
//! ```text
//! Idle -> FetchingStats  -> Persisting -> Done
//! Idle -> RecordingEvent -> Persisting -> Done
//! any state              -> Failed
//! ```

mod orchestrator;
mod policy;
mod run_state;

pub use orchestrator::{Orchestrator, Record, RunFailure, RunMode, RunReport};
pub use policy::{MetricPolicy, Requirement};
pub use run_state::RunState;

const LOG_TARGET: &str = "  pipeline";
