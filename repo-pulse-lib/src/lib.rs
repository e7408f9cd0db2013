#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for repo-pulse
//!
//! This library collects repository-health metrics (stars, forks, clone and view
//! traffic, lines of code) from a hosting API and a local checkout, and records them
//! as a dated time series next to free-form dated events.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and dispatch
//! - [`config`]: Configuration file loading and validation
//! - [`facts`]: Data collection from the hosting API and the code counter
//! - [`records`]: The dated stats and event records, and the pure functions building them
//! - [`store`]: Date-partitioned document persistence
//! - [`pipeline`]: Run orchestration, partial-failure policy and the run state machine
//! - [`error`]: The error taxonomy shared by the pipeline stages

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod facts;
pub mod pipeline;
pub mod records;
pub mod store;

pub use crate::commands::{Host, run};
