use crate::facts::Metric;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One day's worth of repository health, keyed by `date`.
///
/// `stars` and `forks` are always present: a run that cannot fetch them fails
/// instead of producing a record. Every other field may carry an absence reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Calendar day this record describes; at most one record exists per date.
    pub date: NaiveDate,
    pub stars: u64,
    pub forks: u64,
    /// Clones summed over the trailing traffic window
    pub clones: Metric<u64>,
    /// Page views summed over the trailing traffic window
    pub views: Metric<u64>,
    /// Code lines per lower-case language name
    pub loc: Metric<BTreeMap<String, u64>>,
    /// Sum of `loc`, absent exactly when `loc` is absent
    pub total_loc: Metric<u64>,
}
