use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body the control API attaches to non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A control request the backend rejected, carrying the server-reported
/// message when one was present in the response body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ControlRejected {
    pub status: u16,
    pub message: String,
}

impl ControlRejected {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
