//! Data collection for a single repository
//!
//! This module gathers the raw inputs of a stats record from two independent sources:
//! the hosting API (stars, forks, clone and view traffic) and a local checkout run
//! through a code-counting tool (lines of code per language).
//!
//! # Implementation Model
//!
//! - [`hosting::Provider`] wraps a rate-limit aware, retrying HTTP [`hosting::Client`]
//!   and fetches one [`MetricKind`] per call, following pagination to the end.
//! - [`codebase::LineCounter`] abstracts the code counter; [`codebase::TokeiCounter`]
//!   runs the `tokei` tool as a subprocess.
//! - [`Metric`] carries a value or an explicit reason for its absence, so that a
//!   degraded record never hides a failure behind a zero.
//! - [`RepoRef`] names the repository a run targets.

pub mod codebase;
pub mod hosting;
mod metric;
mod metric_kind;
mod repo_ref;

pub use metric::Metric;
pub use metric_kind::MetricKind;
pub use repo_ref::RepoRef;
