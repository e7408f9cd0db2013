use super::StatsRecord;
use crate::facts::Metric;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Counts obtained from the hosting API for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingCounts {
    pub stars: u64,
    pub forks: u64,
    pub clones: Metric<u64>,
    pub views: Metric<u64>,
}

/// Merge hosting counts and code-size data into the record for `date`.
///
/// Never fails. `total_loc` is derived from the language map and shares its absence
/// reason when the map is missing.
#[must_use]
pub fn normalize(counts: HostingCounts, loc: Metric<BTreeMap<String, u64>>, date: NaiveDate) -> StatsRecord {
    let total_loc = loc
        .as_ref()
        .map(|languages| languages.values().fold(0_u64, |total, lines| total.saturating_add(*lines)));

    let total_loc = match (total_loc, loc.absent_reason()) {
        (Some(total), _) => Metric::Present(total),
        (None, reason) => Metric::absent(reason.unwrap_or_default()),
    };

    StatsRecord {
        date,
        stars: counts.stars,
        forks: counts.forks,
        clones: counts.clones,
        views: counts.views,
        loc,
        total_loc,
    }
}
