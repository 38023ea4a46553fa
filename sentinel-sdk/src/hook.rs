//! Failure hook: diagnose, then notify, never fail
//!
//! The hook is the glue between the orchestrator and the two outbound
//! components. Whatever happens inside them (errors, hangs, panics), the
//! orchestrator gets control back once the diagnosis budget and one
//! notification sequence have run their course.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use log::{error, info, warn};

use shared_types::{AlertContext, DiagnosisOutcome, DiagnosisRequest, FailureEvent, NotificationResult, UnavailableReason};

use crate::config::{SentinelConfig, ServiceConfig, DEFAULT_HOOK_TIMEOUT};
use crate::error::Result;
use crate::services::{Diagnoser, DiagnosisClient, NotificationDispatcher, Notifier};

/// In-process callback invoked by the pipeline runner when a step fails
#[async_trait]
pub trait FailureListener: Send + Sync {
    async fn on_failure(&self, event: &FailureEvent);
}

/// What one hook invocation did
#[derive(Debug, Clone)]
pub struct HookReport {
    pub run_id: String,
    pub outcome: DiagnosisOutcome,
    /// `None` only if the notifier panicked
    pub notification: Option<NotificationResult>,
    pub elapsed: Duration,
}

impl HookReport {
    pub fn delivered(&self) -> bool {
        self.notification.as_ref().map_or(false, |n| n.delivered)
    }
}

#[derive(Clone)]
pub struct FailureHook {
    diagnoser: Arc<dyn Diagnoser>,
    notifier: Arc<dyn Notifier>,
    budget: Duration,
}

impl FailureHook {
    pub fn new(diagnoser: Arc<dyn Diagnoser>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            diagnoser,
            notifier,
            budget: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Overall wall-clock budget for the diagnosis leg
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Wire the HTTP diagnosis client and webhook dispatcher
    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        config.validate()?;

        let diagnoser = DiagnosisClient::new(config.diagnosis_client())?;
        let notifier = NotificationDispatcher::new(config.dispatcher())?;

        Ok(Self::new(Arc::new(diagnoser), Arc::new(notifier)).with_budget(config.hook_timeout))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Handle a failure. Returns normally whatever the collaborators do.
    pub async fn handle(&self, event: FailureEvent) {
        self.handle_with_report(event).await;
    }

    pub async fn handle_with_report(&self, event: FailureEvent) -> HookReport {
        let started = Instant::now();
        info!(
            "Step '{}' of pipeline '{}' failed in run {}, starting diagnosis",
            event.step_name, event.pipeline_id, event.run_id
        );

        let request = DiagnosisRequest::from_event(&event);
        let outcome = self.diagnose_within_budget(&request).await;

        let context = AlertContext::from_event(&event);
        let notification = match AssertUnwindSafe(self.notifier.notify(&context, &outcome))
            .catch_unwind()
            .await
        {
            Ok(result) => {
                if !result.delivered {
                    warn!(
                        "Alert for run {} was not delivered after {} attempt(s): {}",
                        event.run_id,
                        result.attempts,
                        result.last_error.as_deref().unwrap_or("unknown error")
                    );
                }
                Some(result)
            }
            Err(panic) => {
                error!("Notifier panicked for run {}: {}", event.run_id, panic_message(&panic));
                None
            }
        };

        HookReport {
            run_id: event.run_id,
            outcome,
            notification,
            elapsed: started.elapsed(),
        }
    }

    async fn diagnose_within_budget(&self, request: &DiagnosisRequest) -> DiagnosisOutcome {
        let call = AssertUnwindSafe(self.diagnoser.diagnose(request)).catch_unwind();

        match tokio::time::timeout(self.budget, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => {
                error!("Diagnoser panicked for run {}: {}", request.run_id, panic_message(&panic));
                DiagnosisOutcome::Unavailable(UnavailableReason::ServiceError)
            }
            Err(_) => {
                warn!(
                    "Diagnosis for run {} exceeded the {:?} budget, abandoning it",
                    request.run_id, self.budget
                );
                DiagnosisOutcome::Unavailable(UnavailableReason::Timeout)
            }
        }
    }
}

#[async_trait]
impl FailureListener for FailureHook {
    async fn on_failure(&self, event: &FailureEvent) {
        self.handle(event.clone()).await;
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
