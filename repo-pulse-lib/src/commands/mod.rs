//! Command-line interface for repo-pulse
//!
//! This module parses arguments, loads the configuration, wires the hosting client,
//! the code counter, the document store and the clock into a
//! [`crate::pipeline::Orchestrator`], and prints what a run produced.
//!
//! # Commands
//!
//! - **stats**: Collect today's metrics for a repository and upsert them
//! - **event**: Append a dated free-form event for a repository
//! - **history**: Print the stats records (or events) stored for a repository
//!
//! Every command prints JSON to the host's output. Warnings about metrics that
//! could not be collected go to the host's error stream. Fatal errors are reported
//! with the pipeline stage that failed and end the process with exit code 1.

mod common;
mod event;
mod history;
mod host;
mod run;
mod stats;

pub use common::{CommonArgs, LogLevel};
pub use event::EventArgs;
pub use history::HistoryArgs;
pub use host::Host;
#[cfg(test)]
pub use host::TestHost;
pub use run::run;
pub use stats::StatsArgs;
