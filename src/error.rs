//! Library error type.

use crate::models::RawEvent;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Request to workflow service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Workflow service error {status} ({kind}): {message}")]
    Service {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Failed to decode service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unsupported event {}: {}", .0.event_id, .0.fields_json())]
    UnsupportedEvent(Box<RawEvent>),
}

impl HistoryError {
    /// The offending event, if this is an unsupported-event failure.
    pub fn unsupported_event(&self) -> Option<&RawEvent> {
        match self {
            HistoryError::UnsupportedEvent(event) => Some(event),
            _ => None,
        }
    }
}
