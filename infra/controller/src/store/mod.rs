//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Store of desired-state records
//!
//! The reconcile loop reads `KafkaSchema` records and their schema
//! ConfigMaps through this trait and writes back only finalizer changes.

pub mod kubernetes;
pub mod memory;

use crate::crd::KafkaSchema;
use crate::error::ControllerError;
use crate::ControllerResult;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::fmt;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

/// ConfigMap key holding the raw schema text
pub const SCHEMA_KEY: &str = "schema";

/// Identity of a namespaced resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing resource; fails for cluster-scoped objects
    pub fn from_resource(schema: &KafkaSchema) -> ControllerResult<Self> {
        let namespace = schema.namespace().ok_or_else(|| {
            ControllerError::InvalidResource(format!(
                "KafkaSchema {} has no namespace",
                schema.name_any()
            ))
        })?;
        Ok(Self::new(namespace, schema.name_any()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Raw schema text referenced by a `KafkaSchema`
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBlob {
    pub namespace: String,
    pub name: String,
    pub schema: String,
}

impl ConfigBlob {
    /// Extract the schema text from a ConfigMap
    pub fn from_config_map(namespace: &str, name: &str, config_map: &ConfigMap) -> ControllerResult<Self> {
        let schema = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(SCHEMA_KEY))
            .ok_or_else(|| {
                ControllerError::InvalidResource(format!(
                    "ConfigMap {}/{} has no '{}' key",
                    namespace, name, SCHEMA_KEY
                ))
            })?;

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            schema: schema.clone(),
        })
    }
}

/// Access to desired-state records and their config blobs
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a `KafkaSchema`; `None` once it has been removed
    async fn get_schema(&self, key: &ObjectKey) -> ControllerResult<Option<KafkaSchema>>;

    /// Persist a `KafkaSchema`. Fails with `Conflict` when the stored
    /// resource version differs from the one carried by `schema`.
    async fn update_schema(&self, schema: &KafkaSchema) -> ControllerResult<KafkaSchema>;

    /// Fetch the config blob, `NotFound` if absent
    async fn get_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<ConfigBlob>;

    /// Delete the config blob
    async fn delete_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<()>;
}
