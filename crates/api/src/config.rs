use std::str::FromStr;
use std::time::Duration;

use researcher_events::HubConfig;
use researcher_pipeline::PipelineConfig;

/// A configuration variable was set but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{key} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub key: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight analyses on shutdown, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. Unset means the in-memory store.
    pub database_url: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Outer deadline per provider call in seconds; `0` disables it (default: `300`).
    pub provider_timeout_secs: u64,
    /// Per-subscriber delivery bound in milliseconds (default: `2000`).
    pub hub_send_timeout_ms: u64,
    /// Buffered events per subscriber (default: `64`).
    pub hub_channel_capacity: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `DATABASE_URL`          | unset (in-memory)       |
    /// | `PERPLEXITY_API_KEY`    | unset                   |
    /// | `OPENAI_API_KEY`        | unset                   |
    /// | `PROVIDER_TIMEOUT_SECS` | `300`                   |
    /// | `HUB_SEND_TIMEOUT_MS`   | `2000`                  |
    /// | `HUB_CHANNEL_CAPACITY`  | `64`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port: parse_or(&lookup, "PORT", "u16", 3000)?,
            cors_origins,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", "u64", 30)?,
            shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", "u64", 30)?,
            database_url: non_empty(lookup("DATABASE_URL")),
            perplexity_api_key: non_empty(lookup("PERPLEXITY_API_KEY")),
            openai_api_key: non_empty(lookup("OPENAI_API_KEY")),
            provider_timeout_secs: parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", "u64", 300)?,
            hub_send_timeout_ms: parse_or(&lookup, "HUB_SEND_TIMEOUT_MS", "u64", 2000)?,
            hub_channel_capacity: parse_or(&lookup, "HUB_CHANNEL_CAPACITY", "usize", 64)?,
        })
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            channel_capacity: self.hub_channel_capacity.max(1),
            send_timeout: Duration::from_millis(self.hub_send_timeout_ms),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            provider_timeout: (self.provider_timeout_secs > 0)
                .then(|| Duration::from_secs(self.provider_timeout_secs)),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_or<F, T>(
    lookup: &F,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            key,
            expected,
            value,
        }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
