//! Diagnosis service client
//!
//! Sends a `DiagnosisRequest` to `POST /diagnose` and turns whatever comes
//! back (or doesn't) into a `DiagnosisOutcome`. Transport failures are
//! retried with jittered exponential backoff; structured error answers and
//! malformed success bodies are not.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;

use shared_types::{Confidence, Diagnosis, DiagnosisOutcome, DiagnosisRequest};

use crate::config::DiagnosisClientConfig;
use crate::error::{Result, ServiceError};
use crate::resilience::RetryExecutor;
use crate::services::common::{build_http_client, create_error_context, parse_error_response, UserAgent};
use crate::util::{generate_request_id, measure_time_async, sanitize_for_logging};

/// Header carrying the per-call correlation id, repeated on every attempt
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Anything that can turn a failure description into a diagnosis outcome
#[async_trait]
pub trait Diagnoser: Send + Sync {
    /// Never fails; problems are reported as `DiagnosisOutcome::Unavailable`
    async fn diagnose(&self, request: &DiagnosisRequest) -> DiagnosisOutcome;
}

/// Success body as sent by the service. Confidence is kept as a string so
/// an unexpected label is reported as a parsing error, not a serde one.
#[derive(Debug, Deserialize)]
struct DiagnosisResponse {
    run_id: String,
    summary: String,
    root_cause: String,
    suggested_fix: String,
    confidence: String,
    #[serde(default)]
    failing_function: Option<String>,
    #[serde(default)]
    raw_model_output: Option<String>,
}

/// HTTP client for the diagnosis service
#[derive(Debug, Clone)]
pub struct DiagnosisClient {
    http_client: Client,
    config: DiagnosisClientConfig,
    retry: RetryExecutor,
}

impl DiagnosisClient {
    /// Create a client; the per-call timeout is baked into the HTTP client
    pub fn new(config: DiagnosisClientConfig) -> Result<Self> {
        let http_client = build_http_client(Some(UserAgent::for_component("diagnosis-client")), config.timeout)?;
        let retry = RetryExecutor::new(config.retry.clone());

        Ok(Self {
            http_client,
            config,
            retry,
        })
    }

    /// Create a client for the given endpoint with default timeouts
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(DiagnosisClientConfig::new(endpoint))
    }

    pub fn config(&self) -> &DiagnosisClientConfig {
        &self.config
    }

    /// Like `diagnose`, but keeps the error for callers that want it
    pub async fn try_diagnose(&self, request: &DiagnosisRequest) -> Result<Diagnosis> {
        let request_id = generate_request_id();
        let request_id = request_id.as_str();

        self.retry
            .execute(|attempt| self.send_once(request, request_id, attempt))
            .await
    }

    async fn send_once(&self, request: &DiagnosisRequest, request_id: &str, attempt: u32) -> Result<Diagnosis> {
        let endpoint = self.config.endpoint.as_str();
        info!(
            "Requesting diagnosis for run {} (attempt {}, request id {})",
            request.run_id, attempt, request_id
        );

        let (response, elapsed) = measure_time_async(|| {
            self.http_client
                .post(endpoint)
                .header(REQUEST_ID_HEADER, request_id)
                .json(request)
                .send()
        })
        .await;

        let response = response.map_err(|e| {
            let context = create_error_context("diagnosis", endpoint, None).with("attempt", attempt);
            ServiceError::from(e).with_context(context)
        })?;

        let status = response.status();
        debug!("Diagnosis service answered {} in {:?}", status, elapsed);

        if !status.is_success() {
            let err = parse_error_response(endpoint, response).await;
            warn!(
                "Diagnosis attempt {} for run {} failed: {}",
                attempt,
                request.run_id,
                sanitize_for_logging(&err.to_string())
            );
            return Err(err);
        }

        let body = response.text().await?;
        parse_diagnosis(&body)
    }
}

/// Validate a 2xx body into a `Diagnosis`. A missing field, an unknown
/// confidence label and a blank summary or root cause are all parsing
/// errors.
pub fn parse_diagnosis(body: &str) -> Result<Diagnosis> {
    let response: DiagnosisResponse = serde_json::from_str(body)?;

    let confidence: Confidence = response
        .confidence
        .parse()
        .map_err(|e| ServiceError::parsing(format!("{}", e)))?;

    if response.summary.trim().is_empty() {
        return Err(ServiceError::parsing("summary is blank"));
    }
    if response.root_cause.trim().is_empty() {
        return Err(ServiceError::parsing("root_cause is blank"));
    }

    Ok(Diagnosis {
        run_id: response.run_id,
        summary: response.summary,
        root_cause: response.root_cause,
        suggested_fix: response.suggested_fix,
        confidence,
        failing_function: response.failing_function.filter(|f| !f.trim().is_empty()),
        raw_model_output: response.raw_model_output.unwrap_or_else(|| body.to_string()),
    })
}

#[async_trait]
impl Diagnoser for DiagnosisClient {
    async fn diagnose(&self, request: &DiagnosisRequest) -> DiagnosisOutcome {
        match self.try_diagnose(request).await {
            Ok(diagnosis) => {
                info!(
                    "Diagnosis for run {} received (confidence {})",
                    request.run_id, diagnosis.confidence
                );
                DiagnosisOutcome::Diagnosis(diagnosis)
            }
            Err(err) => {
                let reason = err.unavailable_reason();
                warn!(
                    "Diagnosis unavailable for run {} ({}): {}",
                    request.run_id,
                    reason,
                    sanitize_for_logging(&err.to_string())
                );
                DiagnosisOutcome::Unavailable(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "run_id": "r1",
        "summary": "Division by zero in transform",
        "root_cause": "Denominator column contains zeros",
        "suggested_fix": "Filter rows where denominator == 0",
        "confidence": "high"
    }"#;

    #[test]
    fn test_parse_valid_body_keeps_raw_body() {
        let diagnosis = parse_diagnosis(VALID).unwrap();
        assert_eq!(diagnosis.confidence, Confidence::High);
        assert_eq!(diagnosis.raw_model_output, VALID);
        assert!(diagnosis.failing_function.is_none());
    }

    #[test]
    fn test_parse_prefers_service_raw_output() {
        let body = r#"{"run_id":"r1","summary":"s","root_cause":"c","suggested_fix":"f",
            "confidence":"Medium","failing_function":"transform_data","raw_model_output":"MODEL"}"#;
        let diagnosis = parse_diagnosis(body).unwrap();
        assert_eq!(diagnosis.confidence, Confidence::Medium);
        assert_eq!(diagnosis.raw_model_output, "MODEL");
        assert_eq!(diagnosis.failing_function.as_deref(), Some("transform_data"));
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        let missing = r#"{"run_id":"r1","summary":"s","suggested_fix":"f","confidence":"low"}"#;
        let unknown = r#"{"run_id":"r1","summary":"s","root_cause":"c","suggested_fix":"f","confidence":"certain"}"#;
        let blank = r#"{"run_id":"r1","summary":"  ","root_cause":"c","suggested_fix":"f","confidence":"low"}"#;

        for body in [missing, unknown, blank, "not json"] {
            let err = parse_diagnosis(body).unwrap_err();
            assert!(matches!(err.root(), ServiceError::Parsing(_)), "{}", body);
            assert!(!err.is_retryable());
        }
    }
}
