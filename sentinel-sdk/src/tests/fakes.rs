//! Hand-written collaborators for hook and pipeline tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use shared_types::{AlertContext, DiagnosisOutcome, DiagnosisRequest, FailureEvent, NotificationResult};

use crate::hook::FailureListener;
use crate::services::{Diagnoser, Notifier};

/// Answers every request with the same outcome, optionally after a delay
pub struct StubDiagnoser {
    pub outcome: DiagnosisOutcome,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StubDiagnoser {
    pub fn new(outcome: DiagnosisOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(outcome: DiagnosisOutcome, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(outcome)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Diagnoser for StubDiagnoser {
    async fn diagnose(&self, _request: &DiagnosisRequest) -> DiagnosisOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

pub struct PanickingDiagnoser;

#[async_trait]
impl Diagnoser for PanickingDiagnoser {
    async fn diagnose(&self, _request: &DiagnosisRequest) -> DiagnosisOutcome {
        panic!("diagnoser exploded")
    }
}

/// Records every notification and answers with a fixed result
pub struct RecordingNotifier {
    pub result: NotificationResult,
    pub received: Mutex<Vec<(AlertContext, DiagnosisOutcome)>>,
}

impl RecordingNotifier {
    pub fn delivering() -> Self {
        Self::answering(NotificationResult::delivered(1))
    }

    pub fn answering(result: NotificationResult) -> Self {
        Self {
            result,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<(AlertContext, DiagnosisOutcome)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, context: &AlertContext, outcome: &DiagnosisOutcome) -> NotificationResult {
        self.received.lock().unwrap().push((context.clone(), outcome.clone()));
        self.result.clone()
    }
}

pub struct PanickingNotifier;

#[async_trait]
impl Notifier for PanickingNotifier {
    async fn notify(&self, _context: &AlertContext, _outcome: &DiagnosisOutcome) -> NotificationResult {
        panic!("notifier exploded")
    }
}

/// Collects the events it is handed
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<FailureEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl FailureListener for RecordingListener {
    async fn on_failure(&self, event: &FailureEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
