//! Tests for loading and validating the sentinel configuration

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::config::{
        ConfigProviderExt, MemoryConfigProvider, SentinelConfig, ServiceConfig, DEFAULT_DIAGNOSIS_URL,
        DEFAULT_HOOK_TIMEOUT, DEFAULT_WEBHOOK_MAX_ATTEMPTS,
    };
    use crate::error::ServiceError;

    fn provider_with_webhook() -> MemoryConfigProvider {
        let mut provider = MemoryConfigProvider::new();
        provider.set("webhook_url", "https://hooks.slack.com/services/T0/B0/X");
        provider
    }

    #[test]
    fn test_defaults_apply() {
        let config = SentinelConfig::from_provider(&provider_with_webhook()).unwrap();

        assert_eq!(config.diagnosis_url, DEFAULT_DIAGNOSIS_URL);
        assert_eq!(config.hook_timeout, DEFAULT_HOOK_TIMEOUT);
        assert_eq!(config.diagnosis_timeout, Duration::from_secs(6));
        assert_eq!(config.diagnosis_max_retries, 2);
        assert_eq!(config.diagnosis_backoff, Duration::from_millis(500));
        assert_eq!(config.webhook_max_attempts, DEFAULT_WEBHOOK_MAX_ATTEMPTS);
        assert_eq!(config.webhook_backoff, Duration::from_millis(300));
        assert!(config.webhook_channel.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut provider = provider_with_webhook();
        provider.set("diagnosis_url", "http://brain.internal:8000/diagnose");
        provider.set("webhook_channel", "#aio-alerts");
        provider.set("hook_timeout", "15s");
        provider.set("diagnosis_max_retries", "0");
        provider.set("webhook_backoff", "250ms");

        let config = SentinelConfig::from_provider(&provider).unwrap();

        assert_eq!(config.diagnosis_url, "http://brain.internal:8000/diagnose");
        assert_eq!(config.webhook_channel.as_deref(), Some("#aio-alerts"));
        assert_eq!(config.hook_timeout, Duration::from_secs(15));
        assert_eq!(config.diagnosis_max_retries, 0);
        assert_eq!(config.webhook_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_webhook_url_is_required() {
        let err = SentinelConfig::from_provider(&MemoryConfigProvider::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let mut provider = provider_with_webhook();
        provider.set("hook_timeout", "soon");
        assert!(SentinelConfig::from_provider(&provider).is_err());

        let mut provider = provider_with_webhook();
        provider.set("webhook_max_attempts", "-1");
        assert!(SentinelConfig::from_provider(&provider).is_err());

        let mut provider = provider_with_webhook();
        provider.set("webhook_max_attempts", "0");
        assert!(SentinelConfig::from_provider(&provider).is_err());
    }

    #[test]
    fn test_overflowing_duration_is_a_configuration_error() {
        let mut provider = provider_with_webhook();
        provider.set("hook_timeout", "99999999999999999h");

        let err = SentinelConfig::from_provider(&provider).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_validate_urls() {
        let config = SentinelConfig::new("ftp://brain/diagnose", "https://chat.example.com/hook");
        assert!(config.validate().is_err());

        let config = SentinelConfig::new("http://127.0.0.1:8000/diagnose", "not a url");
        assert!(config.validate().is_err());

        let config = SentinelConfig::new("http://127.0.0.1:8000/diagnose", "https://chat.example.com/hook");
        assert!(config.validate().is_ok());
        assert_eq!(config.service_name(), "sentinel");
    }

    #[test]
    fn test_component_projections() {
        let mut config = SentinelConfig::new("http://127.0.0.1:8000/diagnose", "https://chat.example.com/hook");
        config.webhook_channel = Some("#ops".to_string());

        let client = config.diagnosis_client();
        assert_eq!(client.endpoint, "http://127.0.0.1:8000/diagnose");
        assert_eq!(client.timeout, Duration::from_secs(6));
        assert_eq!(client.retry.max_retries, 2);
        assert_eq!(client.retry.initial_interval, Duration::from_millis(500));
        assert_eq!(client.retry.max_elapsed_time, Some(config.hook_timeout));

        let dispatcher = config.dispatcher();
        assert_eq!(dispatcher.channel.as_deref(), Some("#ops"));
        assert_eq!(dispatcher.max_attempts, 3);
        assert_eq!(dispatcher.backoff, Duration::from_millis(300));
    }

    #[test]
    fn test_provider_from_values() {
        let provider = MemoryConfigProvider::with_values(HashMap::from([
            ("webhook_url".to_string(), "https://chat.example.com/hook".to_string()),
            ("webhook_max_attempts".to_string(), "5".to_string()),
        ]));

        let config = SentinelConfig::from_provider(&provider).unwrap();
        assert_eq!(config.webhook_max_attempts, 5);
    }

    #[test]
    fn test_provider_ext_defaults() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("n", "7");
        assert_eq!(provider.get_int_or("n", 1).unwrap(), 7);
        assert_eq!(provider.get_int_or("missing", 1).unwrap(), 1);
        assert_eq!(
            provider.get_duration_or("missing", Duration::from_secs(2)).unwrap(),
            Duration::from_secs(2)
        );
        assert_eq!(provider.get_string_or("missing", "x"), "x");
        assert!(provider.get_optional("missing").is_none());
    }
}
