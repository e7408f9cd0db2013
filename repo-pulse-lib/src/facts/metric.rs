use serde::{Deserialize, Serialize};

/// A metric value, or the reason it could not be collected.
///
/// Serialized untagged: a present value is stored as the bare value, an absent one
/// as `{"absent": "<reason>"}`. Absence is never written as zero or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric<T> {
    /// The metric was collected.
    Present(T),

    /// The metric could not be collected.
    Absent { absent: String },
}

impl<T> Metric<T> {
    #[must_use]
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent { absent: reason.into() }
    }

    /// Returns a reference to the value if present, otherwise `None`.
    #[must_use]
    pub const fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent { .. } => None,
        }
    }

    /// The recorded reason if absent.
    #[must_use]
    pub fn absent_reason(&self) -> Option<&str> {
        match self {
            Self::Present(_) => None,
            Self::Absent { absent } => Some(absent),
        }
    }

}
