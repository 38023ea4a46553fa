// diagnosis-service-rs/src/prompt.rs
// Fixed prompt template for root-cause analysis.

use std::fmt::Write as _;

use shared_types::event::tail;
use shared_types::DiagnosisRequest;

/// Stack traces beyond this many bytes are cut from the front; the
/// innermost frames are at the end.
const MAX_STACK_LEN: usize = 12_000;

pub const SYSTEM_PROMPT: &str = r#"You are a senior SRE and data engineer who diagnoses failed data pipeline runs.
You are given the failure of one pipeline step. Analyse it and answer with ONE JSON object and nothing else:

{
  "summary": "one sentence describing what failed",
  "root_cause": "short description of the root cause (e.g. division by zero)",
  "failing_function": "the function or file the failure originates from (e.g. transform_data in pipeline.py)",
  "suggested_fix": "an actionable fix, in Markdown, including a code block",
  "confidence": "high | medium | low"
}

Rules:
1. No preamble or closing remarks outside the JSON object.
2. Base the analysis on the stack trace when one is given.
3. Keep root_cause short.
4. suggested_fix must contain concrete code.
5. Use "low" confidence when the information is insufficient."#;

/// Render the user message for a request.
///
/// The same request always renders to the same text.
pub fn render_prompt(request: &DiagnosisRequest) -> String {
    let mut prompt = String::with_capacity(1024);

    let step = if request.step_name.trim().is_empty() {
        "<unknown>"
    } else {
        request.step_name.as_str()
    };

    let _ = writeln!(prompt, "Run: {}", request.run_id);
    let _ = writeln!(prompt, "Failed step: {}", step);
    let _ = writeln!(prompt, "Error: {}", request.error_summary.trim());

    prompt.push_str("\nStack trace:\n");
    match request.error_stack.as_deref().map(str::trim) {
        Some(stack) if !stack.is_empty() => {
            prompt.push_str(tail(stack, MAX_STACK_LEN));
            prompt.push('\n');
        }
        _ => prompt.push_str("(not available)\n"),
    }

    if !request.context.is_empty() {
        prompt.push_str("\nRun context:\n");
        // BTreeMap iteration is sorted, which keeps the rendering stable
        for (key, value) in &request.context {
            let _ = writeln!(prompt, "- {}: {}", key, value);
        }
    }

    prompt
}
