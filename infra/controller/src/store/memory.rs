//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! In-memory store
//!
//! Mirrors the API-server semantics the reconcile loop depends on:
//! resource versions bump on every write, stale writes conflict, and a
//! record whose deletion was requested disappears once its last
//! finalizer is removed.

use super::{ConfigBlob, ObjectKey, ResourceStore};
use crate::crd::KafkaSchema;
use crate::error::ControllerError;
use crate::ControllerResult;
use async_trait::async_trait;
use kube::ResourceExt;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory store for testing and local runs
#[derive(Default)]
pub struct MemoryStore {
    schemas: RwLock<HashMap<ObjectKey, KafkaSchema>>,
    blobs: RwLock<HashMap<ObjectKey, String>>,
    version: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Create or overwrite a record, as an external actor would
    pub async fn apply_schema(&self, mut schema: KafkaSchema) -> ControllerResult<ObjectKey> {
        let key = ObjectKey::from_resource(&schema)?;
        schema.metadata.resource_version = Some(self.next_version());
        self.schemas.write().await.insert(key.clone(), schema);
        Ok(key)
    }

    /// Create or overwrite a config blob
    pub async fn apply_config_blob(&self, namespace: &str, name: &str, schema: &str) {
        self.blobs
            .write()
            .await
            .insert(ObjectKey::new(namespace, name), schema.to_string());
    }

    /// Request removal: records holding any finalizer get a deletion
    /// timestamp, records without one are removed at once.
    pub async fn request_deletion(&self, key: &ObjectKey) -> ControllerResult<()> {
        let mut schemas = self.schemas.write().await;
        let schema = schemas
            .get_mut(key)
            .ok_or_else(|| ControllerError::NotFound(format!("KafkaSchema {}", key)))?;

        if !schema.finalizers().is_empty() {
            schema.metadata.deletion_timestamp = Some(Time(Utc::now()));
            schema.metadata.resource_version = Some(self.next_version());
        } else {
            schemas.remove(key);
        }
        Ok(())
    }

    /// Current record, if any
    pub async fn schema(&self, key: &ObjectKey) -> Option<KafkaSchema> {
        self.schemas.read().await.get(key).cloned()
    }

    /// Whether a config blob exists
    pub async fn has_config_blob(&self, namespace: &str, name: &str) -> bool {
        self.blobs
            .read()
            .await
            .contains_key(&ObjectKey::new(namespace, name))
    }

    /// Number of successful `update_schema` calls
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_schema(&self, key: &ObjectKey) -> ControllerResult<Option<KafkaSchema>> {
        Ok(self.schema(key).await)
    }

    async fn update_schema(&self, schema: &KafkaSchema) -> ControllerResult<KafkaSchema> {
        let key = ObjectKey::from_resource(schema)?;
        let mut schemas = self.schemas.write().await;
        let stored = schemas
            .get(&key)
            .ok_or_else(|| ControllerError::NotFound(format!("KafkaSchema {}", key)))?;

        if stored.metadata.resource_version != schema.metadata.resource_version {
            return Err(ControllerError::Conflict(format!(
                "KafkaSchema {} was modified: stored version {:?}, update carries {:?}",
                key, stored.metadata.resource_version, schema.metadata.resource_version
            )));
        }

        let mut updated = schema.clone();
        // Deletion state is owned by the store, not by writers.
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        updated.metadata.resource_version = Some(self.next_version());
        self.writes.fetch_add(1, Ordering::SeqCst);

        if updated.is_deletion_requested() && updated.finalizers().is_empty() {
            schemas.remove(&key);
        } else {
            schemas.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn get_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<ConfigBlob> {
        let key = ObjectKey::new(namespace, name);
        let schema = self
            .blobs
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(format!("ConfigMap {}", key)))?;

        Ok(ConfigBlob {
            namespace: namespace.to_string(),
            name: name.to_string(),
            schema,
        })
    }

    async fn delete_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let key = ObjectKey::new(namespace, name);
        self.blobs
            .write()
            .await
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ControllerError::NotFound(format!("ConfigMap {}", key)))
    }
}
