// diagnosis-service-rs/tests/end_to_end.rs
// The real service on a local port, a scripted LLM backend, and the real
// sentinel client and hook talking to it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use diagnosis_service::{app, AppState, BackendPolicy, LLMError, LlmBackend};
use sentinel_sdk::{
    Confidence, Diagnoser, DiagnosisClient, DiagnosisOutcome, DiagnosisRequest, FailureEvent, FailureHook,
    NotificationResult, SentinelConfig, UnavailableReason,
};

struct FixedBackend {
    answer: Result<String, ()>,
}

#[async_trait]
impl LlmBackend for FixedBackend {
    async fn complete(&self, _system_prompt: &str, prompt: &str) -> Result<String, LLMError> {
        assert!(prompt.contains("ZeroDivisionError"));
        self.answer
            .clone()
            .map_err(|_| LLMError::ServerError("502 Bad Gateway".to_string()))
    }
}

async fn spawn_service(backend: FixedBackend) -> SocketAddr {
    let policy = BackendPolicy {
        timeout: Duration::from_millis(500),
        initial_retry_delay: Duration::from_millis(5),
        ..BackendPolicy::default()
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(AppState::new(Arc::new(backend), policy)))
            .await
            .unwrap();
    });

    addr
}

fn event() -> FailureEvent {
    FailureEvent::new("aio_pipeline", "r1", "transform_data", "ZeroDivisionError: division by zero")
        .with_stack("File \"pipeline.py\", line 42, in transform_data\n    rate / 0")
}

fn high_confidence_answer() -> String {
    serde_json::json!({
        "summary": "transform_data divided by zero",
        "root_cause": "The USD rate is divided by a zero literal",
        "failing_function": "transform_data",
        "suggested_fix": "```python\nif divisor == 0:\n    raise ValueError('divisor is zero')\n```",
        "confidence": "high"
    })
    .to_string()
}

#[tokio::test]
async fn test_client_gets_high_confidence_diagnosis() {
    let addr = spawn_service(FixedBackend {
        answer: Ok(format!("```json\n{}\n```", high_confidence_answer())),
    })
    .await;

    let client = DiagnosisClient::with_endpoint(format!("http://{}/diagnose", addr)).unwrap();
    let outcome = client.diagnose(&DiagnosisRequest::from_event(&event())).await;

    let diagnosis = outcome.diagnosis().expect("expected a diagnosis");
    assert_eq!(diagnosis.run_id, "r1");
    assert_eq!(diagnosis.confidence, Confidence::High);
    assert_eq!(diagnosis.failing_function.as_deref(), Some("transform_data"));
    assert!(diagnosis.raw_model_output.starts_with("```json"));
}

#[tokio::test]
async fn test_client_sees_model_parse_error_as_service_error() {
    let addr = spawn_service(FixedBackend {
        answer: Ok("I think it is a division by zero.".to_string()),
    })
    .await;

    let client = DiagnosisClient::with_endpoint(format!("http://{}/diagnose", addr)).unwrap();
    let outcome = client.diagnose(&DiagnosisRequest::from_event(&event())).await;

    // A structured 502 is a deliberate answer, not a malformed body
    assert_eq!(outcome, DiagnosisOutcome::Unavailable(UnavailableReason::ServiceError));
}

#[tokio::test]
async fn test_hook_alerts_with_service_diagnosis() {
    let addr = spawn_service(FixedBackend {
        answer: Ok(high_confidence_answer()),
    })
    .await;

    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_string_contains("The USD rate is divided by a zero literal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let config = SentinelConfig::new(
        format!("http://{}/diagnose", addr),
        format!("{}/hook", webhook.uri()),
    );
    let hook = FailureHook::from_config(&config).unwrap();
    let report = hook.handle_with_report(event()).await;

    assert!(report.outcome.is_diagnosis());
    assert_eq!(report.notification, Some(NotificationResult::delivered(1)));
}

#[tokio::test]
async fn test_hook_alerts_when_backend_is_down() {
    let addr = spawn_service(FixedBackend { answer: Err(()) }).await;

    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_string_contains("Diagnosis unavailable: service_error"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let config = SentinelConfig::new(
        format!("http://{}/diagnose", addr),
        format!("{}/hook", webhook.uri()),
    );
    let report = FailureHook::from_config(&config)
        .unwrap()
        .handle_with_report(event())
        .await;

    assert_eq!(report.outcome, DiagnosisOutcome::Unavailable(UnavailableReason::ServiceError));
    assert!(report.delivered());
}
