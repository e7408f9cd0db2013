use strum::Display;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunState {
    Idle,
    FetchingStats,
    RecordingEvent,
    Persisting,
    Done,
    Failed,
}

impl RunState {
    /// Whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::FetchingStats | Self::RecordingEvent)
                | (Self::FetchingStats | Self::RecordingEvent, Self::Persisting | Self::Done)
                | (Self::Persisting, Self::Done)
        ) || (matches!(next, Self::Failed) && !self.is_terminal())
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
