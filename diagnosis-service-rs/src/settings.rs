// diagnosis-service-rs/src/settings.rs
//
// Environment-driven settings for the diagnosis service.
//
// Configuration (.env file):
// - LLM_API_URL: chat completions endpoint (defaults to OpenAI)
// - LLM_API_KEY: API key for the LLM provider
// - LLM_MODEL: model to use (e.g. "gpt-4o-mini", "google/gemini-2.5-flash")
// - LLM_TIMEOUT_MS: timeout of one backend call in ms (default: 8000)
// - LLM_MAX_RETRIES: retries of a retryable backend error, 0 or 1 (default: 1)
// - LLM_INITIAL_RETRY_DELAY_MS: delay before the retry in ms (default: 250)

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Upper bound on backend retries per request
pub const MAX_BACKEND_RETRIES: u32 = 1;

/// How the service calls its LLM backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendPolicy {
    /// Budget of a single backend call
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_BACKEND_RETRIES,
            initial_retry_delay: Duration::from_millis(250),
            max_retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ServiceSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub policy: BackendPolicy,
}

// The API key never reaches the logs.
impl std::fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            policy: BackendPolicy::default(),
        }
    }
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        let defaults = BackendPolicy::default();

        let max_retries = get_env_var("LLM_MAX_RETRIES", defaults.max_retries);
        if max_retries > MAX_BACKEND_RETRIES {
            log::warn!(
                "LLM_MAX_RETRIES={} is above the limit, using {}",
                max_retries,
                MAX_BACKEND_RETRIES
            );
        }

        let api_key = env::var("LLM_API_KEY").ok().filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!("LLM_API_KEY is not set; every diagnosis will fail with model_unavailable");
        }

        Self {
            api_url: env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key,
            model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            policy: BackendPolicy {
                timeout: Duration::from_millis(get_env_var(
                    "LLM_TIMEOUT_MS",
                    defaults.timeout.as_millis() as u64,
                )),
                max_retries: max_retries.min(MAX_BACKEND_RETRIES),
                initial_retry_delay: Duration::from_millis(get_env_var(
                    "LLM_INITIAL_RETRY_DELAY_MS",
                    defaults.initial_retry_delay.as_millis() as u64,
                )),
                max_retry_delay: defaults.max_retry_delay,
            },
        }
    }
}

// Read an environment variable, falling back on absence or a bad value
fn get_env_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
