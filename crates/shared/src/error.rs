use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Transport,
    Decode,
    UnknownMode,
    Busy,
}

impl ErrorCode {
    /// Transport and decode failures share one user-visible class.
    pub fn is_remote_failure(self) -> bool {
        matches!(self, ErrorCode::Transport | ErrorCode::Decode)
    }
}

/// Notice shown next to a result that did not come from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNotice {
    pub code: ErrorCode,
    pub message: String,
}

impl FailureNotice {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl From<UnknownMode> for FailureNotice {
    fn from(value: UnknownMode) -> Self {
        Self::new(ErrorCode::UnknownMode, value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ResponseDecodeError {
    #[error("response body must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("response body has an unusable shape: {0}")]
    Payload(#[from] serde_json::Error),
}
