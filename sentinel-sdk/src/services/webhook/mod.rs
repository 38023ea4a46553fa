//! Chat webhook notification dispatcher
//!
//! Renders a diagnosis (or the reason there is none) into a Slack-compatible
//! `{"text": ...}` message and delivers it. Transport failures and 5xx
//! answers are retried on a fixed doubling schedule; a 4xx means the payload
//! itself was rejected and is reported straight away.

use std::fmt::Write as _;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use shared_types::{AlertContext, DeliveryState, Diagnosis, DiagnosisOutcome, NotificationResult, UnavailableReason};

use crate::config::DispatcherConfig;
use crate::error::mapping::status_reason;
use crate::error::{Result, ServiceError};
use crate::resilience::{RetryConfig, RetryExecutor};
use crate::services::common::{build_http_client, create_error_context, UserAgent};
use crate::util::{generate_request_id, sanitize_for_logging, truncate_string};

/// Header repeated on every attempt of one delivery sequence
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Longest rendering of any single free-text field, in bytes
pub const MAX_FIELD_LEN: usize = 1500;

/// Anything that can deliver an alert for a failed run
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Never fails; delivery problems are reported in the result
    async fn notify(&self, context: &AlertContext, outcome: &DiagnosisOutcome) -> NotificationResult;
}

/// Body POSTed to the webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Render the chat message for an outcome
pub fn format_message(context: &AlertContext, outcome: &DiagnosisOutcome) -> String {
    match outcome {
        DiagnosisOutcome::Diagnosis(diagnosis) => format_diagnosis(context, diagnosis),
        DiagnosisOutcome::Unavailable(reason) => format_unavailable(context, *reason),
    }
}

fn write_location(text: &mut String, context: &AlertContext) {
    match (&context.pipeline_id, &context.step_name) {
        (Some(pipeline), Some(step)) => {
            let _ = writeln!(text, "*Pipeline*: `{}`  *Step*: `{}`", pipeline, step);
        }
        (Some(pipeline), None) => {
            let _ = writeln!(text, "*Pipeline*: `{}`", pipeline);
        }
        (None, Some(step)) => {
            let _ = writeln!(text, "*Step*: `{}`", step);
        }
        (None, None) => {}
    }
}

fn format_diagnosis(context: &AlertContext, diagnosis: &Diagnosis) -> String {
    let mut text = format!(":rotating_light: *Pipeline failure diagnosed* (run `{}`)\n", context.run_id);
    write_location(&mut text, context);

    let _ = writeln!(text, "*Summary*: {}", truncate_string(&diagnosis.summary, MAX_FIELD_LEN));
    let _ = writeln!(text, "*Root cause*: {}", truncate_string(&diagnosis.root_cause, MAX_FIELD_LEN));
    if let Some(function) = &diagnosis.failing_function {
        let _ = writeln!(text, "*Failing function*: `{}`", truncate_string(function, 200));
    }
    let _ = writeln!(
        text,
        "*Suggested fix*:\n{}",
        truncate_string(&diagnosis.suggested_fix, MAX_FIELD_LEN)
    );
    let _ = write!(text, "*Confidence*: {}", diagnosis.confidence);

    text
}

fn format_unavailable(context: &AlertContext, reason: UnavailableReason) -> String {
    let mut text = format!(":warning: *Pipeline failure* (run `{}`)\n", context.run_id);
    write_location(&mut text, context);

    if let Some(summary) = &context.error_summary {
        let _ = writeln!(text, "*Error*: {}", truncate_string(summary, MAX_FIELD_LEN));
    }
    let _ = write!(text, "Diagnosis unavailable: {}", reason);

    text
}

/// Webhook retry rule: transport failures and 5xx answers
fn should_retry_delivery(err: &ServiceError) -> bool {
    err.is_retryable() || err.status_code().map_or(false, |code| code >= 500)
}

/// What gets reported as `last_error`
fn delivery_error(err: &ServiceError) -> String {
    match err.status_code().and_then(|code| StatusCode::from_u16(code).ok()) {
        Some(status) => status_reason(status),
        None => sanitize_for_logging(&err.to_string()),
    }
}

/// Delivers alerts to one chat webhook
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    http_client: Client,
    config: DispatcherConfig,
    retry: RetryExecutor,
}

impl NotificationDispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let http_client = build_http_client(Some(UserAgent::for_component("notifier")), config.timeout)?;
        let retry = RetryExecutor::new(RetryConfig::deterministic(
            config.max_attempts.saturating_sub(1),
            config.backoff,
        ));

        Ok(Self {
            http_client,
            config,
            retry,
        })
    }

    /// Create a dispatcher for the given webhook with default timeouts
    pub fn with_webhook(webhook_url: impl Into<String>) -> Result<Self> {
        Self::new(DispatcherConfig::new(webhook_url))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Notify about a run when nothing but its id is known
    pub async fn notify_run(&self, run_id: &str, outcome: &DiagnosisOutcome) -> NotificationResult {
        self.deliver(&AlertContext::for_run(run_id), outcome).await
    }

    /// Run one delivery sequence to a terminal state under a fresh
    /// idempotency key
    pub async fn deliver(&self, context: &AlertContext, outcome: &DiagnosisOutcome) -> NotificationResult {
        self.deliver_with_key(context, outcome, &generate_request_id()).await
    }

    /// Run one delivery sequence; every attempt carries `idempotency_key`
    pub async fn deliver_with_key(
        &self,
        context: &AlertContext,
        outcome: &DiagnosisOutcome,
        idempotency_key: &str,
    ) -> NotificationResult {
        self.deliver_tracked(context, outcome, idempotency_key).await.0
    }

    /// Like `deliver_with_key`, also returning the terminal delivery state
    pub async fn deliver_tracked(
        &self,
        context: &AlertContext,
        outcome: &DiagnosisOutcome,
        idempotency_key: &str,
    ) -> (NotificationResult, DeliveryState) {
        let payload = WebhookPayload {
            text: format_message(context, outcome),
            channel: self.config.channel.clone(),
        };
        let payload = &payload;
        let max_attempts = self.config.max_attempts.max(1);

        let mut state = DeliveryState::Pending;
        let run = self
            .retry
            .run_observed(
                |attempt| self.post_once(payload, idempotency_key, attempt),
                should_retry_delivery,
                |attempt, err| {
                    let retryable = err.map_or(false, should_retry_delivery);
                    let next = state.advance(err.is_none(), retryable, attempt, max_attempts);
                    debug!("Notification for run {}: {} -> {}", context.run_id, state, next);
                    state = next;
                },
            )
            .await;

        let result = match run.result {
            Ok(()) => {
                info!(
                    "Notification for run {} delivered after {} attempt(s)",
                    context.run_id, run.attempts
                );
                NotificationResult::delivered(run.attempts)
            }
            Err(err) => {
                // The backoff can run dry before the attempt budget does
                if !state.is_terminal() {
                    state = DeliveryState::Exhausted;
                }
                let last_error = delivery_error(&err);
                warn!(
                    "Notification for run {} not delivered after {} attempt(s): {}",
                    context.run_id, run.attempts, last_error
                );
                NotificationResult::failed(run.attempts, last_error)
            }
        };
        debug_assert_eq!(result.delivered, state == DeliveryState::Delivered);

        (result, state)
    }

    async fn post_once(&self, payload: &WebhookPayload, idempotency_key: &str, attempt: u32) -> Result<()> {
        let url = self.config.webhook_url.as_str();
        debug!(
            "Posting notification to {} (attempt {})",
            sanitize_for_logging(url),
            attempt
        );

        let response = self
            .http_client
            .post(url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                let context = create_error_context("webhook", url, None).with("attempt", attempt);
                ServiceError::from(e).with_context(context)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        warn!("Webhook answered {} on attempt {}", status, attempt);
        Err(ServiceError::service(status_reason(status))
            .with_context(create_error_context("webhook", url, Some(status)).with("attempt", attempt)))
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, context: &AlertContext, outcome: &DiagnosisOutcome) -> NotificationResult {
        self.deliver(context, outcome).await
    }
}
