// diagnosis-service-rs/src/llm_client.rs
//
// HTTP client for LLM providers speaking the OpenAI-compatible
// /chat/completions protocol (OpenAI, OpenRouter, Ollama, Gemini's
// compatibility endpoint).
//
// This module provides:
// - The `LlmBackend` seam the HTTP layer calls through
// - `LLMClient`, one chat completion per call via reqwest
// - Classification of retryable vs. non-retryable errors
// - `generate_text`, the bounded retry loop with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::{BackendPolicy, ServiceSettings};

// Low temperature keeps answers close to deterministic
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// Errors of a single backend call
#[derive(Debug, Error)]
pub enum LLMError {
    /// 400, 401, 403, 404 or a missing key; retrying will not help
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// 5xx from the provider
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered 2xx with a body that is not a completion
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl LLMError {
    /// Network, timeout, 5xx and 429 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::ServerError(_)
                | LLMError::NetworkError(_)
                | LLMError::Timeout(_)
                | LLMError::RateLimitExceeded(_)
        )
    }
}

/// Anything that can complete a prompt
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One completion attempt, no retries
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, LLMError>;

    /// Whether the backend has what it needs to make calls at all
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct LLMClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl LLMClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(settings.policy.timeout)
            .build()
            .map_err(|e| LLMError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        log::info!(
            "LLM client initialized for {} (model: {})",
            settings.api_url,
            settings.model
        );

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // Execute a single request attempt
    async fn execute_request(&self, request_body: &ChatCompletionRequest<'_>) -> Result<String, LLMError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::InvalidRequest("API key is not set".to_string()))?;

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LLMError::NetworkError(format!("Request timed out: {}", err))
                } else if err.is_connect() {
                    LLMError::NetworkError(format!("Connection failed: {}", err))
                } else {
                    LLMError::NetworkError(format!("Network error: {}", err))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return match status.as_u16() {
                400 => Err(LLMError::InvalidRequest(format!("Bad request: {}", text))),
                401 => Err(LLMError::InvalidRequest(format!("Unauthorized: {}", text))),
                403 => Err(LLMError::InvalidRequest(format!("Forbidden: {}", text))),
                404 => Err(LLMError::InvalidRequest(format!("Not found: {}", text))),
                429 => Err(LLMError::RateLimitExceeded(text)),
                500..=599 => Err(LLMError::ServerError(format!("{}: {}", status, text))),
                _ => Err(LLMError::UnknownError(format!("{}: {}", status, text))),
            };
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LLMError::ParseError(format!("Failed to parse response: {}", err)))?;

        if let Some(usage) = &data.usage {
            log::info!("LLM request completed. Used {} tokens", usage.total_tokens);
        }

        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LLMError::ParseError("No choices returned in response".to_string()))
    }
}

#[async_trait]
impl LlmBackend for LLMClient {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, LLMError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
        };

        log::debug!("Sending LLM request to {} (model: {})", self.api_url, self.model);
        self.execute_request(&request_body).await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn create_backoff(policy: &BackendPolicy) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_retry_delay)
        .with_max_interval(policy.max_retry_delay)
        .with_multiplier(2.0)
        .with_randomization_factor(0.5)
        .with_max_elapsed_time(None)
        .build()
}

/// Complete a prompt under `policy`: every attempt is cut off at
/// `policy.timeout`, and only retryable errors are retried, at most
/// `policy.max_retries` times.
pub async fn generate_text(
    backend: &dyn LlmBackend,
    system_prompt: &str,
    prompt: &str,
    policy: &BackendPolicy,
) -> Result<String, LLMError> {
    let mut backoff = create_backoff(policy);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if attempt > 1 {
            log::info!("Retry attempt {} for LLM request", attempt);
        }

        let result = match tokio::time::timeout(policy.timeout, backend.complete(system_prompt, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout(policy.timeout)),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(err) => {
                if !err.is_retryable() || attempt > policy.max_retries {
                    log::error!("LLM request failed after {} attempts: {}", attempt, err);
                    return Err(err);
                }

                match backoff.next_backoff() {
                    Some(backoff_duration) => {
                        let jitter = rand::thread_rng().gen_range(0..=50);
                        let delay = backoff_duration + Duration::from_millis(jitter);
                        log::warn!("Retryable error: {}. Retrying in {:?}", err, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        log::error!("Exceeded maximum backoff time: {}", err);
                        return Err(err);
                    }
                }
            }
        }
    }
}
