//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Error types for the Kafka schema controller

use thiserror::Error;

/// Controller error types
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Registry location or client settings are missing or invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Transport failure while reaching the schema registry
    #[error("Network error: {method} {url}: {source}")]
    NetworkError {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The schema registry answered with anything other than HTTP 200
    #[error("Registry error: {method} {url} returned {status}: {body}")]
    RegistryError {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The resource or its config blob is missing data the loop needs
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    KubeError(#[from] kube::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    ServerError(String),
}

impl ControllerError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// Whether a later invocation is likely to succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::Conflict(_) => true,
            Self::RegistryError { status, .. } => *status >= 500 || *status == 429,
            Self::KubeError(_) => true,
            _ => false,
        }
    }

    /// Whether this is an optimistic-concurrency failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "configuration",
            Self::NetworkError { .. } => "network",
            Self::RegistryError { .. } => "registry",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidResource(_) => "invalid_resource",
            Self::KubeError(_) => "kube",
            Self::SerializationError(_) => "serialization",
            Self::ServerError(_) => "server",
        }
    }
}

impl From<config::ConfigError> for ControllerError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}
