use strum::{Display, EnumIter, IntoStaticStr};

/// The individual things a stats run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Repository metadata, fetched to validate the repository and the credential
    Metadata,
    Stars,
    Forks,
    Clones,
    Views,
    /// Lines of code from the local checkout
    Loc,
}

impl MetricKind {
    /// Whether a failure to fetch this kind always aborts a stats run.
    #[must_use]
    pub const fn is_always_required(self) -> bool {
        matches!(self, Self::Metadata | Self::Stars | Self::Forks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(MetricKind::Views.to_string(), "views");
        assert_eq!(MetricKind::Loc.to_string(), "loc");
        let name: &'static str = MetricKind::Stars.into();
        assert_eq!(name, "stars");
    }

    #[test]
    fn test_required_kinds() {
        let required: Vec<_> = MetricKind::iter().filter(|k| k.is_always_required()).collect();
        assert_eq!(required, vec![MetricKind::Metadata, MetricKind::Stars, MetricKind::Forks]);
    }
}
