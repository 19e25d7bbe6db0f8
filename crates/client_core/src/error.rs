use std::time::Duration;

use shared::{
    domain::{FieldName, Mode},
    error::{ErrorCode, FailureNotice, ResponseDecodeError, UnknownMode},
};
use thiserror::Error;

/// Rejected engine transitions. None of these reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{mode} is missing required fields: {}", join_fields(.missing))]
    Validation { mode: Mode, missing: Vec<FieldName> },
    #[error("a {mode} request is already in flight")]
    SubmissionInFlight { mode: Mode },
    #[error("cannot edit {field} while a request is in flight")]
    EditWhileSubmitting { field: FieldName },
    #[error("{field} is not used by {mode}")]
    FieldNotInMode { mode: Mode, field: FieldName },
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("base url cannot carry endpoint paths: {0}")]
    InvalidBaseUrl(String),
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::FieldNotInMode { .. } => ErrorCode::Validation,
            Self::SubmissionInFlight { .. } | Self::EditWhileSubmitting { .. } => ErrorCode::Busy,
            Self::UnknownMode(_) => ErrorCode::UnknownMode,
            Self::InvalidBaseUrl(_) => ErrorCode::Validation,
        }
    }

    /// Fields to flag inline next to the form.
    pub fn missing_fields(&self) -> &[FieldName] {
        match self {
            Self::Validation { missing, .. } => missing,
            _ => &[],
        }
    }
}

impl From<UnknownMode> for DispatchError {
    fn from(value: UnknownMode) -> Self {
        Self::UnknownMode(value.0)
    }
}

fn join_fields(fields: &[FieldName]) -> String {
    fields
        .iter()
        .map(|field| field.wire_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a remote call produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote service answered with status {status}")]
    Status { status: u16 },
    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl CallError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) | Self::Status { .. } | Self::Timeout(_) => ErrorCode::Transport,
            Self::Decode(_) => ErrorCode::Decode,
        }
    }

    pub fn to_notice(&self) -> FailureNotice {
        FailureNotice::new(
            self.code(),
            format!("Remote call failed ({self}). Showing demo response."),
        )
    }
}

impl From<ResponseDecodeError> for CallError {
    fn from(value: ResponseDecodeError) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for CallError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}
