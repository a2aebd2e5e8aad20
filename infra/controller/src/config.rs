//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Configuration for the Kafka schema controller
//!
//! Configuration is resolved once at startup and handed to every component
//! that needs it. Registry settings come from the `SCHEMA_REGISTRY_*`
//! environment variables; everything else may come from an optional TOML
//! file overlaid by `KAFKA_SCHEMA_CONTROLLER__<SECTION>__<KEY>` variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of the registry environment variables
pub const REGISTRY_ENV_PREFIX: &str = "SCHEMA_REGISTRY";

/// Prefix of the controller environment variables
pub const CONTROLLER_ENV_PREFIX: &str = "KAFKA_SCHEMA_CONTROLLER";

/// Environment variable naming the optional configuration file
pub const CONFIG_PATH_ENV: &str = "KAFKA_SCHEMA_CONTROLLER_CONFIG";

const REGISTRY_KEYS: [&str; 5] = ["host", "port", "key", "secret", "request_timeout_secs"];

/// Controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Schema registry location and credentials
    pub registry: RegistryConfig,

    /// Requeue and backoff settings
    pub reconcile: ReconcileConfig,

    /// Health and metrics server
    pub server: ServerConfig,
}

/// Schema registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry host
    pub host: Option<String>,

    /// Registry port
    pub port: Option<String>,

    /// Basic-auth user
    pub key: Option<String>,

    /// Basic-auth password
    pub secret: Option<String>,

    /// Per-request timeout in seconds, 0 disables it
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            key: None,
            secret: None,
            request_timeout_secs: 30,
        }
    }
}

impl RegistryConfig {
    /// Registry configuration pointing at `host:port`
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Attach basic-auth credentials
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.secret = Some(secret.into());
        self
    }

    /// Registry host, empty values count as unset
    pub fn host(&self) -> Option<&str> {
        non_empty(&self.host)
    }

    /// Registry port, empty values count as unset
    pub fn port(&self) -> Option<&str> {
        non_empty(&self.port)
    }

    /// Basic-auth pair. Present when either half is configured; the
    /// missing half is sent empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = non_empty(&self.key);
        let secret = non_empty(&self.secret);
        if key.is_none() && secret.is_none() {
            return None;
        }
        Some((key.unwrap_or_default(), secret.unwrap_or_default()))
    }

    /// Request timeout, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Requeue and backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Delay before re-running a resource with `autoReconciliation` set
    pub requeue_interval_secs: u64,

    /// Delay before retrying a failed reconciliation
    pub error_backoff_secs: u64,

    /// Delay before retrying after an optimistic-concurrency conflict
    pub conflict_backoff_secs: u64,

    /// Delay before retrying a failure that needs a config or spec change
    pub permanent_error_backoff_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            requeue_interval_secs: 60,
            error_backoff_secs: 30,
            conflict_backoff_secs: 1,
            permanent_error_backoff_secs: 300,
        }
    }
}

impl ReconcileConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn conflict_backoff(&self) -> Duration {
        Duration::from_secs(self.conflict_backoff_secs)
    }

    pub fn permanent_error_backoff(&self) -> Duration {
        Duration::from_secs(self.permanent_error_backoff_secs)
    }
}

/// Health and metrics server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration with precedence: file, controller variables,
    /// then `SCHEMA_REGISTRY_*` variables for the registry section.
    pub fn load(config_file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let registry_env = config::Config::builder()
            .add_source(config::Environment::with_prefix(REGISTRY_ENV_PREFIX))
            .build()?;

        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(CONTROLLER_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        for key in REGISTRY_KEYS {
            if let Ok(value) = registry_env.get_string(key) {
                builder = builder.set_override(format!("registry.{}", key), value)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Load configuration, reading the file path from `KAFKA_SCHEMA_CONTROLLER_CONFIG`
    pub fn load_from_env() -> Result<Self, config::ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load(Some(Path::new(&path))),
            _ => Self::load(None),
        }
    }
}
