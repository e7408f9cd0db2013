use crate::facts::MetricKind;
use serde::{Deserialize, Serialize};

/// Whether a failure to collect a metric aborts the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// The run fails and nothing is persisted.
    Required,

    /// The record is persisted with the metric marked absent and a warning.
    #[default]
    Optional,
}

/// Requirement for the metrics whose handling is configurable.
///
/// Metadata, stars and forks are always required. Lines of code are always optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricPolicy {
    #[serde(default)]
    pub clones: Requirement,

    #[serde(default)]
    pub views: Requirement,
}

impl MetricPolicy {
    #[must_use]
    pub const fn requirement(&self, kind: MetricKind) -> Requirement {
        match kind {
            MetricKind::Metadata | MetricKind::Stars | MetricKind::Forks => Requirement::Required,
            MetricKind::Clones => self.clones,
            MetricKind::Views => self.views,
            MetricKind::Loc => Requirement::Optional,
        }
    }
}
