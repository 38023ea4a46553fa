//! Outbound service clients
//!
//! `diagnosis` talks to the diagnosis service, `webhook` to the chat platform.

pub mod diagnosis;
pub mod webhook;
mod common;

pub use common::UserAgent;
pub use diagnosis::{Diagnoser, DiagnosisClient};
pub use webhook::{NotificationDispatcher, Notifier};
