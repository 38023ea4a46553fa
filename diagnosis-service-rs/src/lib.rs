// diagnosis-service-rs/src/lib.rs
//
// Stateless HTTP diagnosis service.
//
// `POST /diagnose` takes a DiagnosisRequest, renders the fixed prompt, asks
// the LLM backend (one timeout per call, at most one retry) and answers
// with a structured Diagnosis, or with an ErrorBody:
// - 400 invalid_request: body is not a valid request
// - 502 model_parse_error: model answered something that is not a diagnosis
// - 503 model_unavailable: backend failed or timed out after the retry

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use once_cell::sync::Lazy;
use serde::Serialize;

use shared_types::{Diagnosis, DiagnosisRequest};

pub mod error;
pub mod llm_client;
pub mod parser;
pub mod prompt;
pub mod settings;

pub use error::ApiError;
pub use llm_client::{LLMClient, LLMError, LlmBackend};
pub use settings::{BackendPolicy, ServiceSettings};

/// Largest accepted request body. Enforced by the Json extractor, so an
/// oversized request still gets an ErrorBody.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// Track service start time for uptime reporting
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub struct AppState {
    backend: Arc<dyn LlmBackend>,
    policy: BackendPolicy,
}

impl AppState {
    pub fn new(backend: Arc<dyn LlmBackend>, policy: BackendPolicy) -> Self {
        Self { backend, policy }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service_name: String,
    pub uptime_seconds: u64,
    pub llm_configured: bool,
}

/// Build the service router
pub fn app(state: AppState) -> Router {
    let _ = *START_TIME;

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/diagnose", post(diagnose_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(Arc::new(state))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let llm_configured = state.backend.is_configured();

    Json(HealthResponse {
        status: if llm_configured { "SERVING" } else { "DEGRADED" },
        service_name: config_rs::get_formatted_service_name("DIAGNOSIS"),
        uptime_seconds: START_TIME.elapsed().as_secs(),
        llm_configured,
    })
}

async fn diagnose_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiagnosisRequest>, JsonRejection>,
) -> Result<Json<Diagnosis>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::BodyTooLarge(MAX_BODY_BYTES)
        } else {
            ApiError::InvalidRequest(rejection.body_text())
        }
    })?;
    validate(&request)?;

    log::info!(
        "Diagnosing run {} (step: {})",
        request.run_id,
        request.step_name
    );

    let prompt = prompt::render_prompt(&request);
    let raw = llm_client::generate_text(
        state.backend.as_ref(),
        prompt::SYSTEM_PROMPT,
        &prompt,
        &state.policy,
    )
    .await?;

    log::debug!("Raw model output for run {}:\n{}", request.run_id, raw);

    let diagnosis = parser::parse_diagnosis(&request.run_id, &raw)?;
    log::info!(
        "Run {} diagnosed with {} confidence",
        diagnosis.run_id,
        diagnosis.confidence
    );

    Ok(Json(diagnosis))
}

fn validate(request: &DiagnosisRequest) -> Result<(), ApiError> {
    if request.run_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("run_id must not be blank".to_string()));
    }
    if request.error_summary.trim().is_empty() {
        return Err(ApiError::InvalidRequest("error_summary must not be blank".to_string()));
    }
    Ok(())
}
