// shared-types-rs/src/lib.rs
// Data model shared by the sentinel SDK (hook, client, dispatcher) and the
// diagnosis service. Everything here is request-scoped and immutable once built.

pub mod diagnosis;
pub mod event;
pub mod notification;
pub mod wire;

pub use diagnosis::{Confidence, Diagnosis, DiagnosisOutcome, UnavailableReason};
pub use event::{DiagnosisRequest, FailureEvent};
pub use notification::{AlertContext, DeliveryState, NotificationResult};
pub use wire::{ErrorBody, ErrorCode};
