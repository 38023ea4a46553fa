// diagnosis-service-rs/src/parser.rs
//
// Deterministic extraction of a Diagnosis from model output.
//
// The model must answer with exactly one JSON object, optionally wrapped in
// a ```json fence. Anything else is rejected; nothing is inferred from
// surrounding prose.

use serde::Deserialize;
use thiserror::Error;

use shared_types::diagnosis::UnknownConfidence;
use shared_types::{Confidence, Diagnosis};

#[derive(Debug, Error)]
pub enum ModelParseError {
    #[error("model output is empty")]
    Empty,

    #[error("model output is not a diagnosis object: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("model left `{0}` blank")]
    BlankField(&'static str),

    #[error(transparent)]
    Confidence(#[from] UnknownConfidence),
}

#[derive(Debug, Deserialize)]
struct ModelAnswer {
    summary: String,
    root_cause: String,
    suggested_fix: String,
    confidence: String,
    #[serde(default)]
    failing_function: Option<String>,
}

/// Remove one surrounding Markdown code fence, if present
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return text;
    };

    // Drop the info string (`json`, `JSON`, ...) on the opening line
    match inner.find('\n') {
        Some(newline) if !inner[..newline].contains(|c: char| c == '{' || c == '[') => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}

/// Parse raw model output into the diagnosis for `run_id`.
///
/// `raw_model_output` on the result is `raw`, untouched.
pub fn parse_diagnosis(run_id: &str, raw: &str) -> Result<Diagnosis, ModelParseError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ModelParseError::Empty);
    }

    let answer: ModelAnswer = serde_json::from_str(body)?;

    let summary = required(answer.summary, "summary")?;
    let root_cause = required(answer.root_cause, "root_cause")?;
    let suggested_fix = required(answer.suggested_fix, "suggested_fix")?;
    let confidence: Confidence = answer.confidence.parse()?;
    let failing_function = answer
        .failing_function
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    Ok(Diagnosis {
        run_id: run_id.to_string(),
        summary,
        root_cause,
        suggested_fix,
        confidence,
        failing_function,
        raw_model_output: raw.to_string(),
    })
}

fn required(value: String, field: &'static str) -> Result<String, ModelParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ModelParseError::BlankField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"{
        "summary": "transform_data divided by zero",
        "root_cause": "Division by zero",
        "failing_function": "transform_data in pipeline.py",
        "suggested_fix": "```python\nif divisor == 0:\n    return None\n```",
        "confidence": "High"
    }"#;

    #[test]
    fn test_plain_json() {
        let diagnosis = parse_diagnosis("r1", ANSWER).unwrap();

        assert_eq!(diagnosis.run_id, "r1");
        assert_eq!(diagnosis.root_cause, "Division by zero");
        assert_eq!(diagnosis.confidence, Confidence::High);
        assert_eq!(diagnosis.failing_function.as_deref(), Some("transform_data in pipeline.py"));
        assert!(diagnosis.suggested_fix.contains("if divisor == 0"));
        assert_eq!(diagnosis.raw_model_output, ANSWER);
    }

    #[test]
    fn test_fenced_json() {
        let fenced = format!("```json\n{}\n```", ANSWER);
        let diagnosis = parse_diagnosis("r1", &fenced).unwrap();
        assert_eq!(diagnosis.summary, "transform_data divided by zero");
        assert_eq!(diagnosis.raw_model_output, fenced);

        let bare_fence = format!("```\n{}\n```", ANSWER);
        assert!(parse_diagnosis("r1", &bare_fence).is_ok());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    #[test]
    fn test_prose_is_rejected() {
        let chatty = format!("Here is my analysis:\n{}\nHope this helps!", ANSWER);
        assert!(matches!(parse_diagnosis("r1", &chatty), Err(ModelParseError::NotJson(_))));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let answer = r#"{"summary":"s","root_cause":"r","confidence":"low"}"#;
        assert!(matches!(parse_diagnosis("r1", answer), Err(ModelParseError::NotJson(_))));
    }

    #[test]
    fn test_blank_field_is_rejected() {
        let answer = r#"{"summary":" ","root_cause":"r","suggested_fix":"f","confidence":"low"}"#;
        assert!(matches!(
            parse_diagnosis("r1", answer),
            Err(ModelParseError::BlankField("summary"))
        ));
    }

    #[test]
    fn test_unknown_confidence_is_rejected() {
        let answer = r#"{"summary":"s","root_cause":"r","suggested_fix":"f","confidence":"certain"}"#;
        assert!(matches!(parse_diagnosis("r1", answer), Err(ModelParseError::Confidence(_))));
    }

    #[test]
    fn test_optional_failing_function() {
        let answer = r#"{"summary":"s","root_cause":"r","suggested_fix":"f","confidence":"medium","failing_function":""}"#;
        let diagnosis = parse_diagnosis("r1", answer).unwrap();
        assert_eq!(diagnosis.failing_function, None);
        assert_eq!(diagnosis.confidence, Confidence::Medium);
    }

    #[test]
    fn test_empty_output() {
        assert!(matches!(parse_diagnosis("r1", "  \n"), Err(ModelParseError::Empty)));
        assert!(matches!(parse_diagnosis("r1", "```json\n```"), Err(ModelParseError::Empty)));
    }
}
