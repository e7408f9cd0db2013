use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A free-form annotation attached to a calendar day.
///
/// Several events may share a date; they are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub description: String,
}

/// Build an event record from user input.
///
/// The description is stored trimmed and must not be empty once trimmed.
pub fn record_event(description: &str, date: NaiveDate) -> Result<EventRecord> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::InvalidEvent("event description is empty".to_string()));
    }

    Ok(EventRecord {
        date,
        description: description.to_string(),
    })
}
