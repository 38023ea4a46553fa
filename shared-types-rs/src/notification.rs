// shared-types-rs/src/notification.rs
// Delivery bookkeeping for chat notifications.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::FailureEvent;

/// Final record of one notification attempt sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub delivered: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(attempts: u32) -> Self {
        Self {
            delivered: true,
            attempts,
            last_error: None,
        }
    }

    pub fn failed(attempts: u32, last_error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            attempts,
            last_error: Some(last_error.into()),
        }
    }
}

/// State of a single delivery attempt sequence.
///
/// `Pending -> Retrying{..}* -> Delivered | Exhausted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    /// Waiting to issue `attempt` (1-based) after a failed one
    Retrying { attempt: u32 },
    Delivered,
    Exhausted,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Exhausted)
    }

    /// Next state after an attempt. `attempts_made` counts attempts so far
    /// including the one that just finished.
    pub fn advance(self, succeeded: bool, retryable: bool, attempts_made: u32, max_attempts: u32) -> Self {
        if self.is_terminal() {
            return self;
        }
        if succeeded {
            DeliveryState::Delivered
        } else if retryable && attempts_made < max_attempts {
            DeliveryState::Retrying {
                attempt: attempts_made + 1,
            }
        } else {
            DeliveryState::Exhausted
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::Pending => write!(f, "Pending"),
            DeliveryState::Retrying { attempt } => write!(f, "Retrying({})", attempt),
            DeliveryState::Delivered => write!(f, "Delivered"),
            DeliveryState::Exhausted => write!(f, "Exhausted"),
        }
    }
}

/// Failure context a chat message is rendered with
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertContext {
    pub run_id: String,
    pub pipeline_id: Option<String>,
    pub step_name: Option<String>,
    pub error_summary: Option<String>,
}

impl AlertContext {
    /// Context that only knows the run
    pub fn for_run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn from_event(event: &FailureEvent) -> Self {
        Self {
            run_id: event.run_id.clone(),
            pipeline_id: Some(event.pipeline_id.clone()),
            step_name: Some(event.step_name.clone()),
            error_summary: Some(event.error_summary.clone()),
        }
    }
}
