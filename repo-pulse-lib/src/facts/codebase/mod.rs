mod loc_report;
mod provider;

pub use loc_report::LocReport;
pub use provider::{LineCounter, TokeiCounter};

pub(crate) const LOG_TARGET: &str = "  codebase";
