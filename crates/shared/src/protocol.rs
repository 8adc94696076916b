use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub username: String,
    pub event: String,
    pub logged_at: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn new(username: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            event: event.into(),
            logged_at: Utc::now(),
        }
    }

    pub fn pressed(username: impl Into<String>, control_id: &str) -> Self {
        Self::new(username, format!("pressed the {control_id} button."))
    }

    pub fn manually_pressed(control_id: &str) -> Self {
        Self::new("You", format!("Manually pressed the {control_id} button."))
    }
}

/// Notifications for the presentation layer. Never acknowledged or retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiEvent {
    Connection(ConnectionStatus),
    Error(UiError),
    EventLog(EventLogEntry),
}
