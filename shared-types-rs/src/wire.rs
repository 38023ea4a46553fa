// shared-types-rs/src/wire.rs
// Structured error bodies returned by the diagnosis service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error code of a failed `POST /diagnose`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ModelParseError,
    ModelUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::ModelParseError => "model_parse_error",
            ErrorCode::ModelUnavailable => "model_unavailable",
        }
    }

    /// HTTP status the service answers with for this code
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::ModelParseError => 502,
            ErrorCode::ModelUnavailable => 503,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{"error_code": ..., "message": ...}`
///
/// The code is kept as a string on the wire so that clients can still
/// recognise a structured error carrying a code they do not know yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error_code: code.as_str().to_string(),
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: code.as_str().to_string(),
            message: Some(message.into()),
        }
    }

    /// The code, if it is one this crate knows
    pub fn code(&self) -> Option<ErrorCode> {
        serde_json::from_value(serde_json::Value::String(self.error_code.clone())).ok()
    }
}
