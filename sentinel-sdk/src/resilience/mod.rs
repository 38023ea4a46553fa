//! Resilience patterns for outbound calls
//!
//! Both outbound legs (diagnosis service and chat webhook) retry transient
//! failures through the same executor; only their schedules and retry
//! predicates differ.

mod retry;

pub use retry::{RetryConfig, RetryExecutor, RetryOutcome};
