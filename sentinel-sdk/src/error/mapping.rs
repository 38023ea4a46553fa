//! Error mapping for HTTP responses
//!
//! This module converts non-2xx responses from the diagnosis service and
//! the chat webhook into normalized ServiceError values.

use reqwest::StatusCode;

use shared_types::{ErrorBody, ErrorCode};

use super::{ErrorContext, ServiceError};

/// Map a diagnosis service error response to a ServiceError.
///
/// A body carrying `{"error_code": ...}` is a deliberate answer from the
/// service and is never retried. Without one, transient statuses (a proxy
/// page, a load balancer timeout) count as transport failures.
pub fn map_diagnosis_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    context.service = "diagnosis".to_string();
    context.status_code = Some(status.as_u16());

    if let Ok(error_body) = serde_json::from_str::<ErrorBody>(body) {
        context.error_code = Some(error_body.error_code.clone());
        let message = match &error_body.message {
            Some(message) => format!("{} ({}): {}", error_body.error_code, status, message),
            None => format!("{} ({})", error_body.error_code, status),
        };
        return match error_body.code() {
            Some(ErrorCode::InvalidRequest) => ServiceError::validation(message),
            _ => ServiceError::service(message),
        };
    }

    map_http_error(status, body)
}

/// Map a generic HTTP error to a ServiceError by status alone
pub fn map_http_error(status: StatusCode, body: &str) -> ServiceError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    };

    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        ServiceError::timeout(message)
    } else if is_retryable_status(status) {
        ServiceError::network(message)
    } else {
        ServiceError::service(message)
    }
}

/// Human-readable, lower-cased reason for a status, e.g. `"bad request"`
pub fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_lowercase)
        .unwrap_or_else(|| format!("http {}", status.as_u16()))
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 502 | 503 | 504)
}
