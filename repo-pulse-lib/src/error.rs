//! Error taxonomy for the collection and persistence pipeline.
//!
//! Each variant names the stage and the metric or operation that failed, so the
//! message printed to the user is enough to tell what went wrong and where.

use crate::facts::MetricKind;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The hosting API rejected the credential. Never retried.
    #[error("authentication failed while fetching {kind}: {message}")]
    Authentication { kind: MetricKind, message: String },

    /// The hosting API could not deliver a metric, after retries where applicable.
    #[error("hosting API unavailable while fetching {kind}: {message}")]
    UpstreamUnavailable { kind: MetricKind, message: String },

    /// The code counter could not be invoked or produced unusable output.
    #[error("code-size collector unavailable: {0}")]
    CollectorUnavailable(String),

    /// The event description is unusable.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The document store could not complete a read or write.
    #[error("persistence failed during {operation} on collection '{collection}': {message}")]
    Persistence {
        operation: &'static str,
        collection: String,
        message: String,
    },

    /// The configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// The pipeline stage this error belongs to.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Authentication { .. } | Self::UpstreamUnavailable { .. } | Self::CollectorUnavailable(_) => "fetching stats",
            Self::InvalidEvent(_) => "recording event",
            Self::Persistence { .. } => "persisting",
            Self::Configuration(_) => "loading configuration",
        }
    }

    /// The metric kind this error is about, if it came from the hosting API.
    #[must_use]
    pub const fn metric_kind(&self) -> Option<MetricKind> {
        match self {
            Self::Authentication { kind, .. } | Self::UpstreamUnavailable { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn persistence(operation: &'static str, collection: &str, message: impl core::fmt::Display) -> Self {
        Self::Persistence {
            operation,
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }
}
