//! Configuration management for the failure sentinel
//!
//! This module provides utilities for loading and validating the settings
//! the hook, the diagnosis client and the notification dispatcher are
//! constructed with. Values come from pluggable providers (environment
//! variables, in-memory maps) and are passed explicitly into each component;
//! nothing reads the environment at call time.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};
use crate::resilience::RetryConfig;
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a duration configuration value ("500ms", "10s", "2m")
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value)
            .ok_or_else(|| ServiceError::configuration(format!("Invalid duration for key {}: {}", key, value)))
    }

    /// Get an optional string; missing and blank are both `None`
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_string(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default. Present but
    /// malformed values are an error rather than silently defaulted.
    fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get_string(key) {
            Ok(_) => self.get_int(key),
            Err(_) => Ok(default),
        }
    }

    /// Get a duration configuration value with a default
    fn get_duration_or(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get_string(key) {
            Ok(_) => self.get_duration(key),
            Err(_) => Ok(default),
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => {
                ServiceError::configuration(format!("Environment variable is not valid unicode: {}", env_key))
            }
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    /// Configuration values
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    /// Ordered list of config providers to try
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            if let Ok(value) = provider.get_string(key) {
                return Ok(value);
            }
        }

        Err(ServiceError::configuration(format!(
            "Configuration key not found in any provider: {}",
            key
        )))
    }
}

/// Global default configuration provider (`SENTINEL_*` variables)
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("SENTINEL")));

/// Trait for component configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Component name
    fn service_name(&self) -> &str;
}

pub const DEFAULT_DIAGNOSIS_URL: &str = "http://127.0.0.1:8000/diagnose";
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DIAGNOSIS_TIMEOUT: Duration = Duration::from_secs(6);
pub const DEFAULT_DIAGNOSIS_MAX_RETRIES: u32 = 2;
pub const DEFAULT_DIAGNOSIS_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WEBHOOK_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_WEBHOOK_BACKOFF: Duration = Duration::from_millis(300);

/// Everything the failure hook needs, supplied by the host at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Full URL of the diagnosis endpoint
    pub diagnosis_url: String,

    /// Chat webhook URL
    pub webhook_url: String,

    /// Optional channel override sent along with the message
    pub webhook_channel: Option<String>,

    /// Overall wall-clock budget for diagnosis within one hook invocation
    pub hook_timeout: Duration,

    /// Per-call timeout towards the diagnosis service
    pub diagnosis_timeout: Duration,

    /// Retries after the first diagnosis attempt (transport failures only)
    pub diagnosis_max_retries: u32,

    /// Base interval of the diagnosis backoff
    pub diagnosis_backoff: Duration,

    /// Per-call timeout towards the webhook
    pub webhook_timeout: Duration,

    /// Total webhook attempts, first one included
    pub webhook_max_attempts: u32,

    /// Base interval of the webhook backoff
    pub webhook_backoff: Duration,
}

impl SentinelConfig {
    /// Defaults with the two endpoints filled in
    pub fn new(diagnosis_url: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            diagnosis_url: diagnosis_url.into(),
            webhook_url: webhook_url.into(),
            webhook_channel: None,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
            diagnosis_timeout: DEFAULT_DIAGNOSIS_TIMEOUT,
            diagnosis_max_retries: DEFAULT_DIAGNOSIS_MAX_RETRIES,
            diagnosis_backoff: DEFAULT_DIAGNOSIS_BACKOFF,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            webhook_max_attempts: DEFAULT_WEBHOOK_MAX_ATTEMPTS,
            webhook_backoff: DEFAULT_WEBHOOK_BACKOFF,
        }
    }

    /// Load configuration from a config provider. Only `webhook_url` is
    /// required; every other key falls back to its default.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            diagnosis_url: provider.get_string_or("diagnosis_url", DEFAULT_DIAGNOSIS_URL),
            webhook_url: provider.get_string("webhook_url")?,
            webhook_channel: provider.get_optional("webhook_channel"),
            hook_timeout: provider.get_duration_or("hook_timeout", DEFAULT_HOOK_TIMEOUT)?,
            diagnosis_timeout: provider.get_duration_or("diagnosis_timeout", DEFAULT_DIAGNOSIS_TIMEOUT)?,
            diagnosis_max_retries: non_negative(
                "diagnosis_max_retries",
                provider.get_int_or("diagnosis_max_retries", DEFAULT_DIAGNOSIS_MAX_RETRIES as i64)?,
            )?,
            diagnosis_backoff: provider.get_duration_or("diagnosis_backoff", DEFAULT_DIAGNOSIS_BACKOFF)?,
            webhook_timeout: provider.get_duration_or("webhook_timeout", DEFAULT_WEBHOOK_TIMEOUT)?,
            webhook_max_attempts: non_negative(
                "webhook_max_attempts",
                provider.get_int_or("webhook_max_attempts", DEFAULT_WEBHOOK_MAX_ATTEMPTS as i64)?,
            )?,
            webhook_backoff: provider.get_duration_or("webhook_backoff", DEFAULT_WEBHOOK_BACKOFF)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `SENTINEL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }

    /// Settings for the diagnosis client
    pub fn diagnosis_client(&self) -> DiagnosisClientConfig {
        DiagnosisClientConfig {
            endpoint: self.diagnosis_url.clone(),
            timeout: self.diagnosis_timeout,
            retry: RetryConfig {
                max_retries: self.diagnosis_max_retries,
                initial_interval: self.diagnosis_backoff,
                max_interval: self.hook_timeout,
                multiplier: 2.0,
                randomization_factor: 0.2,
                max_elapsed_time: Some(self.hook_timeout),
            },
        }
    }

    /// Settings for the notification dispatcher
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            webhook_url: self.webhook_url.clone(),
            channel: self.webhook_channel.clone(),
            timeout: self.webhook_timeout,
            max_attempts: self.webhook_max_attempts,
            backoff: self.webhook_backoff,
        }
    }
}

fn non_negative(key: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ServiceError::configuration(format!("{} must be a non-negative integer, got {}", key, value)))
}

fn validate_url(key: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ServiceError::configuration(format!("Invalid {}: {}", key, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ServiceError::configuration(format!(
            "Invalid {}: unsupported scheme '{}'",
            key, other
        ))),
    }
}

impl ServiceConfig for SentinelConfig {
    fn validate(&self) -> Result<()> {
        validate_url("diagnosis_url", &self.diagnosis_url)?;
        validate_url("webhook_url", &self.webhook_url)?;

        if self.hook_timeout.is_zero() {
            return Err(ServiceError::configuration("hook_timeout must be greater than zero"));
        }
        if self.diagnosis_timeout.is_zero() || self.webhook_timeout.is_zero() {
            return Err(ServiceError::configuration("per-call timeouts must be greater than zero"));
        }
        if self.webhook_max_attempts == 0 {
            return Err(ServiceError::configuration("webhook_max_attempts must be at least 1"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "sentinel"
    }
}

/// Diagnosis client settings
#[derive(Debug, Clone)]
pub struct DiagnosisClientConfig {
    /// Full URL of `POST /diagnose`
    pub endpoint: String,

    /// Per-call timeout
    pub timeout: Duration,

    /// Retry policy for transport failures
    pub retry: RetryConfig,
}

impl DiagnosisClientConfig {
    /// Default timeout and retry policy for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_DIAGNOSIS_TIMEOUT,
            retry: RetryConfig {
                max_retries: DEFAULT_DIAGNOSIS_MAX_RETRIES,
                initial_interval: DEFAULT_DIAGNOSIS_BACKOFF,
                max_interval: DEFAULT_HOOK_TIMEOUT,
                multiplier: 2.0,
                randomization_factor: 0.2,
                max_elapsed_time: Some(DEFAULT_HOOK_TIMEOUT),
            },
        }
    }
}

/// Notification dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub webhook_url: String,
    pub channel: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    /// First backoff interval; doubles after each failed attempt
    pub backoff: Duration,
}

impl DispatcherConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            channel: None,
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
            max_attempts: DEFAULT_WEBHOOK_MAX_ATTEMPTS,
            backoff: DEFAULT_WEBHOOK_BACKOFF,
        }
    }
}
