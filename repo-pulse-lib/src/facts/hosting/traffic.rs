//! Trailing-window traffic reports (clones and page views).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// One bucket of a traffic report
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficEntry {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

/// Body of `GET /repos/{owner}/{repo}/traffic/clones`
#[derive(Debug, Deserialize)]
pub(super) struct CloneTraffic {
    #[serde(default)]
    pub clones: Vec<TrafficEntry>,
}

/// Body of `GET /repos/{owner}/{repo}/traffic/views`
#[derive(Debug, Deserialize)]
pub(super) struct ViewTraffic {
    #[serde(default)]
    pub views: Vec<TrafficEntry>,
}

/// Sum the counts of the entries falling inside the `window_days` days ending at `today` (inclusive).
#[must_use]
pub fn sum_window(entries: &[TrafficEntry], today: NaiveDate, window_days: u32) -> u64 {
    let first_day = today - chrono::Days::new(u64::from(window_days.saturating_sub(1)));

    entries
        .iter()
        .filter(|entry| {
            let day = entry.timestamp.date_naive();
            day >= first_day && day <= today
        })
        .fold(0_u64, |total, entry| total.saturating_add(entry.count))
}
