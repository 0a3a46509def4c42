use crate::dispatch::DispatchPolicy;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub transport: TransportConfig,
    pub dispatch: DispatchConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL of the media server's call control API.
    pub base_url: String,
    /// Timeout in seconds for each transport request.
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Base URL of the agent worker's dispatch API.
    pub base_url: String,
    /// Total dispatch attempts before the agent is reported as failed.
    pub max_attempts: u32,
    /// Timeout in seconds for each individual dispatch attempt.
    pub attempt_timeout_seconds: u64,
    /// First retry delay in milliseconds; doubles on every retry.
    pub backoff_base_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds an ended session stays in the registry so late dispatch
    /// outcomes can still find it.
    pub grace_period_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3939 }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4400".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4500".to_string(),
            max_attempts: 3,
            attempt_timeout_seconds: 10,
            backoff_base_ms: 1000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: 30,
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_seconds),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

impl SessionConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = global::config_file()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = global::config_file()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3939);
        assert_eq!(config.dispatch.max_attempts, 3);
        assert_eq!(config.session.grace_period_seconds, 30);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dispatch]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.max_attempts, 5);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.dispatch.backoff_base_ms, 1000);
        assert_eq!(config.server.port, 3939);
    }

    #[test]
    fn test_dispatch_policy_conversion() {
        let config = DispatchConfig {
            base_url: "http://localhost:4500".to_string(),
            max_attempts: 4,
            attempt_timeout_seconds: 2,
            backoff_base_ms: 250,
        };

        let policy = config.policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(2));
        assert_eq!(policy.backoff_base, Duration::from_millis(250));
    }
}
