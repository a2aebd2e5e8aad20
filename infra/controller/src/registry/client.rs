//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! HTTP client for the schema registry

use crate::config::RegistryConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::ControllerResult;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

/// Media type of every registry request
pub const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Sends one request to the schema registry and classifies the outcome
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Succeeds only on HTTP 200; the response body is discarded
    async fn send(&self, method: Method, url: &str, body: Option<String>) -> ControllerResult<()>;
}

/// `reqwest`-backed registry client
#[derive(Clone)]
pub struct RegistryClient {
    http_client: Client,
    credentials: Option<(String, String)>,
    metrics: Arc<Metrics>,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(config: &RegistryConfig, metrics: Arc<Metrics>) -> ControllerResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
            ControllerError::configuration(format!("failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            http_client,
            credentials: config
                .credentials()
                .map(|(key, secret)| (key.to_string(), secret.to_string())),
            metrics,
        })
    }
}

#[async_trait]
impl RegistryTransport for RegistryClient {
    async fn send(&self, method: Method, url: &str, body: Option<String>) -> ControllerResult<()> {
        let mut request = self
            .http_client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, REGISTRY_CONTENT_TYPE);

        if let Some((key, secret)) = &self.credentials {
            request = request.basic_auth(key, Some(secret));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|source| {
            warn!("Failed to reach schema registry: {} {}: {}", method, url, source);
            self.metrics.record_registry_request(method.as_str(), None);
            ControllerError::NetworkError {
                method: method.to_string(),
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        self.metrics
            .record_registry_request(method.as_str(), Some(status.as_u16()));

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!("Cannot read schema registry response body: {}", e);
                String::new()
            });
            warn!(
                "Schema registry rejected {} {}: status {}, body {}",
                method, url, status, body
            );
            return Err(ControllerError::RegistryError {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!("Schema registry accepted {} {}", method, url);
        Ok(())
    }
}
