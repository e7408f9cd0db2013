mod client;
mod provider;
mod traffic;

pub use client::{Client, Page, RateLimitInfo, RetryPolicy};
pub use provider::{Provider, Repository};
pub use traffic::{TrafficEntry, sum_window};

pub(crate) const LOG_TARGET: &str = "   hosting";
