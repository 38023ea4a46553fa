// shared-types-rs/src/diagnosis.rs
// Structured diagnosis produced by the diagnosis service, and the outcome
// type the client hands to the notification layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How sure the model is about its root cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a confidence label is not one of high/medium/low
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown confidence level: {0}")]
pub struct UnknownConfidence(pub String);

impl FromStr for Confidence {
    type Err = UnknownConfidence;

    // Case-insensitive; models are inconsistent about capitalisation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(UnknownConfidence(s.to_string())),
        }
    }
}

/// Root-cause analysis for one failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub run_id: String,
    pub summary: String,
    pub root_cause: String,
    /// May contain a fenced code snippet
    pub suggested_fix: String,
    pub confidence: Confidence,
    /// Function or file the model pinned the failure on, when it named one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_function: Option<String>,
    /// Verbatim model answer, kept for audit
    #[serde(default)]
    pub raw_model_output: String,
}

/// Why no diagnosis could be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    Timeout,
    ServiceError,
    InvalidResponse,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::ServiceError => "service_error",
            UnavailableReason::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking the diagnosis service about a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiagnosisOutcome {
    Diagnosis(Diagnosis),
    Unavailable(UnavailableReason),
}

impl DiagnosisOutcome {
    pub fn is_diagnosis(&self) -> bool {
        matches!(self, DiagnosisOutcome::Diagnosis(_))
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            DiagnosisOutcome::Diagnosis(diagnosis) => Some(diagnosis),
            DiagnosisOutcome::Unavailable(_) => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        match self {
            DiagnosisOutcome::Diagnosis(_) => None,
            DiagnosisOutcome::Unavailable(reason) => Some(*reason),
        }
    }
}

impl From<Diagnosis> for DiagnosisOutcome {
    fn from(diagnosis: Diagnosis) -> Self {
        DiagnosisOutcome::Diagnosis(diagnosis)
    }
}

impl From<UnavailableReason> for DiagnosisOutcome {
    fn from(reason: UnavailableReason) -> Self {
        DiagnosisOutcome::Unavailable(reason)
    }
}
