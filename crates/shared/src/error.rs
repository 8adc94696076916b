use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown board, scene or control. Aborts the single event only.
    ConfigResolution,
    /// Scene or group creation/query failed on the remote side.
    RemoteSync,
    /// Socket-level failure. The connection must be re-established.
    Transport,
    /// A group id could not be resolved remotely.
    GroupResolution,
}

/// User-facing failure notice. Carries the message shown to the operator,
/// not the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct UiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl UiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
