// diagnosis-service-rs/src/error.rs
// HTTP-facing errors of the diagnosis endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use shared_types::{ErrorBody, ErrorCode};

use crate::llm_client::LLMError;
use crate::parser::ModelParseError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request body is larger than {0} bytes")]
    BodyTooLarge(usize),

    #[error("model output could not be parsed: {0}")]
    ModelParse(#[from] ModelParseError),

    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] LLMError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::BodyTooLarge(_) => ErrorCode::InvalidRequest,
            ApiError::ModelParse(_) => ErrorCode::ModelParseError,
            ApiError::ModelUnavailable(_) => ErrorCode::ModelUnavailable,
        }
    }

    pub fn status(&self) -> StatusCode {
        if let ApiError::BodyTooLarge(_) = self {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        StatusCode::from_u16(self.code().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Only validation messages are echoed; backend details stay in the logs
    fn body(&self) -> ErrorBody {
        match self {
            ApiError::InvalidRequest(message) => ErrorBody::with_message(self.code(), message.clone()),
            ApiError::BodyTooLarge(_) => ErrorBody::with_message(self.code(), self.to_string()),
            _ => ErrorBody::new(self.code()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Diagnosis failed: {}", self);
        } else {
            log::warn!("Rejected diagnosis request: {}", self);
        }

        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::InvalidRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::BodyTooLarge(1024).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::ModelParse(ModelParseError::Empty).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::ModelUnavailable(LLMError::ServerError("boom".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_backend_details_are_not_echoed() {
        let err = ApiError::ModelUnavailable(LLMError::InvalidRequest("Unauthorized: sk-123".into()));
        let body = err.body();
        assert_eq!(body.error_code, "model_unavailable");
        assert!(body.message.is_none());

        let body = ApiError::InvalidRequest("run_id must not be blank".into()).body();
        assert_eq!(body.message.as_deref(), Some("run_id must not be blank"));
    }
}
