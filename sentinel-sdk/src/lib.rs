//! # Sentinel SDK
//!
//! Failure-triggered diagnosis and alerting for data pipelines.
//!
//! This crate provides:
//!
//! - `FailureHook`: the orchestration glue invoked when a pipeline step fails
//! - `DiagnosisClient`: typed HTTP client for the diagnosis service
//! - `NotificationDispatcher`: chat webhook delivery with retries
//! - `Pipeline`: a minimal in-process runner that fires the hook
//! - Error handling, retry and configuration utilities shared by the above
//!
//! ## Architecture
//!
//! - `Diagnoser` / `Notifier`: the seams the hook talks through
//! - `FailureListener`: what the pipeline runner calls on failure
//! - `RetryExecutor`: exponential backoff for both outbound legs
//! - `ServiceError`: error taxonomy mapped onto `UnavailableReason`

pub mod services;
pub use services::{Diagnoser, DiagnosisClient, NotificationDispatcher, Notifier};

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{RetryConfig, RetryExecutor};

pub mod config;
pub use config::{ConfigProvider, SentinelConfig, ServiceConfig};

pub mod hook;
pub use hook::{FailureHook, FailureListener, HookReport};

pub mod pipeline;
pub use pipeline::{Pipeline, PipelineError};

pub use shared_types::{
    AlertContext, Confidence, Diagnosis, DiagnosisOutcome, DiagnosisRequest, FailureEvent, NotificationResult,
    UnavailableReason,
};

// Utility module for common functionality
mod util;

#[cfg(test)]
mod tests;

/// Build a hook from `SENTINEL_*` environment variables
pub fn hook_from_env() -> Result<FailureHook> {
    FailureHook::from_config(&SentinelConfig::from_env()?)
}
