//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Schema registry endpoint resolution

use crate::config::RegistryConfig;
use crate::crd::DeletionPolicy;
use crate::error::ControllerError;
use crate::ControllerResult;

/// Maps subjects to registry URLs. No network access.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    base_url: Option<String>,
}

impl EndpointResolver {
    /// Create a resolver from the registry configuration
    pub fn new(config: &RegistryConfig) -> Self {
        let base_url = match (config.host(), config.port()) {
            (Some(host), Some(port)) => Some(format!("http://{}:{}", host, port)),
            _ => None,
        };
        Self { base_url }
    }

    /// `{base}/subjects/{subject}/versions`
    pub fn versions_url(&self, subject: &str) -> ControllerResult<String> {
        Ok(format!("{}/subjects/{}/versions", self.base_url()?, subject))
    }

    /// `{base}/config/{subject}`
    pub fn compatibility_url(&self, subject: &str) -> ControllerResult<String> {
        Ok(format!("{}/config/{}", self.base_url()?, subject))
    }

    /// `{base}/subjects/{subject}`, with `?permanent=true` for hard deletion
    pub fn deletion_url(&self, subject: &str, policy: DeletionPolicy) -> ControllerResult<String> {
        let mut url = format!("{}/subjects/{}", self.base_url()?, subject);
        if policy.is_permanent() {
            url.push_str("?permanent=true");
        }
        Ok(url)
    }

    fn base_url(&self) -> ControllerResult<&str> {
        self.base_url.as_deref().ok_or_else(|| {
            ControllerError::configuration("schema registry host or port is not set")
        })
    }
}
