use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lines of code per language for one checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocReport {
    /// Code lines (blanks and comments excluded) keyed by lower-case language name
    pub languages: BTreeMap<String, u64>,
}

impl LocReport {
    /// Sum of all per-language counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.languages.values().fold(0_u64, |total, lines| total.saturating_add(*lines))
    }
}

impl FromIterator<(String, u64)> for LocReport {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut languages = BTreeMap::new();
        for (language, lines) in iter {
            let entry = languages.entry(language).or_insert(0_u64);
            *entry = entry.saturating_add(lines);
        }
        Self { languages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_languages() {
        let report: LocReport = [("python".to_string(), 5000), ("rust".to_string(), 250)].into_iter().collect();
        assert_eq!(report.total(), 5250);
    }

    #[test]
    fn test_from_iter_merges_duplicates() {
        let report: LocReport = [("python".to_string(), 10), ("python".to_string(), 5)].into_iter().collect();
        assert_eq!(report.languages.get("python"), Some(&15));
        assert_eq!(report.languages.len(), 1);
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert_eq!(LocReport::default().total(), 0);
    }
}
