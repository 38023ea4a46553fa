//! Minimal in-process pipeline runner
//!
//! Runs named async steps in order, each one fed the previous step's output.
//! The first failing step ends the run: a `FailureEvent` is built, every
//! registered listener is awaited once, and the step error is returned.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{error, info};
use serde_json::Value;
use thiserror::Error;

use shared_types::FailureEvent;

use crate::hook::FailureListener;

/// Metadata key listing the steps that finished before the failure
pub const META_COMPLETED_STEPS: &str = "completed_steps";

/// Metadata key holding the 0-based index of the failed step
pub const META_FAILED_STEP_INDEX: &str = "failed_step_index";

type StepFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;
type StepFn = Box<dyn Fn(Value) -> StepFuture + Send + Sync>;

struct Step {
    name: String,
    run: StepFn,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step '{step}' of pipeline '{pipeline_id}' failed in run {run_id}: {error}")]
    StepFailed {
        pipeline_id: String,
        run_id: String,
        step: String,
        error: anyhow::Error,
    },
}

impl PipelineError {
    pub fn step(&self) -> &str {
        match self {
            PipelineError::StepFailed { step, .. } => step,
        }
    }
}

pub struct Pipeline {
    id: String,
    steps: Vec<Step>,
    listeners: Vec<Arc<dyn FailureListener>>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Append a step
    pub fn step<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.steps.push(Step {
            name: name.into(),
            run: Box::new(move |input| Box::pin(f(input))),
        });
        self
    }

    /// Register a listener invoked once per failed run
    pub fn with_listener(mut self, listener: Arc<dyn FailureListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run all steps starting from `Value::Null`
    pub async fn run(&self, run_id: &str) -> Result<Value, PipelineError> {
        self.run_with_input(run_id, Value::Null).await
    }

    pub async fn run_with_input(&self, run_id: &str, input: Value) -> Result<Value, PipelineError> {
        let mut value = input;
        let mut completed: Vec<&str> = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            info!("Pipeline '{}' run {}: running step '{}'", self.id, run_id, step.name);

            match (step.run)(value).await {
                Ok(output) => {
                    completed.push(&step.name);
                    value = output;
                }
                Err(err) => {
                    error!(
                        "Pipeline '{}' run {}: step '{}' failed: {:#}",
                        self.id, run_id, step.name, err
                    );

                    let event = FailureEvent::new(&self.id, run_id, &step.name, err.to_string())
                        .with_stack(format!("{:?}", err))
                        .with_metadata(META_COMPLETED_STEPS, completed.join(","))
                        .with_metadata(META_FAILED_STEP_INDEX, index.to_string());

                    for listener in &self.listeners {
                        listener.on_failure(&event).await;
                    }

                    return Err(PipelineError::StepFailed {
                        pipeline_id: self.id.clone(),
                        run_id: run_id.to_string(),
                        step: step.name.clone(),
                        error: err,
                    });
                }
            }
        }

        info!("Pipeline '{}' run {} succeeded", self.id, run_id);
        Ok(value)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("steps", &self.step_names())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
