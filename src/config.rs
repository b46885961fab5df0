//! Process configuration from environment variables.

use std::time::Duration;

/// Fatal configuration problems (exit code 1).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the process reads from the environment, loaded once at
/// startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub store_url: String,
    pub store_service_key: String,
    /// Hard per-worker deadline (`AGENT_TIMEOUT_SECONDS`, default 300).
    pub agent_timeout: Duration,
    /// Round period (`TRADING_INTERVAL_SECONDS`, default 30).
    pub trading_interval: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn seconds(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm_api_key: required("LLM_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.x.ai/v1".into()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "grok-beta".into()),
            store_url: required("STORE_URL")?,
            store_service_key: required("STORE_SERVICE_KEY")?,
            agent_timeout: seconds("AGENT_TIMEOUT_SECONDS", 300)?,
            trading_interval: seconds("TRADING_INTERVAL_SECONDS", 30)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_default() {
        assert_eq!(
            seconds("SURELY_UNSET_VAR_FOR_TEST", 300).unwrap(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_missing_required_is_error() {
        let err = required("SURELY_UNSET_VAR_FOR_TEST").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
