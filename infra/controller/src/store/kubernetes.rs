//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Kubernetes API server backed store

use super::{ConfigBlob, ObjectKey, ResourceStore};
use crate::crd::KafkaSchema;
use crate::error::ControllerError;
use crate::ControllerResult;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn schemas(&self, namespace: &str) -> Api<KafkaSchema> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_schema(&self, key: &ObjectKey) -> ControllerResult<Option<KafkaSchema>> {
        Ok(self.schemas(&key.namespace).get_opt(&key.name).await?)
    }

    async fn update_schema(&self, schema: &KafkaSchema) -> ControllerResult<KafkaSchema> {
        let key = ObjectKey::from_resource(schema)?;
        self.schemas(&key.namespace)
            .replace(&key.name, &PostParams::default(), schema)
            .await
            .map_err(|e| classify(e, &format!("KafkaSchema {}", key)))
    }

    async fn get_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<ConfigBlob> {
        let config_map = self
            .config_maps(namespace)
            .get_opt(name)
            .await?
            .ok_or_else(|| {
                ControllerError::NotFound(format!("ConfigMap {}/{}", namespace, name))
            })?;
        debug!(
            "Fetched ConfigMap {}/{} at version {:?}",
            namespace,
            name,
            config_map.resource_version()
        );
        ConfigBlob::from_config_map(namespace, name, &config_map)
    }

    async fn delete_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        self.config_maps(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, &format!("ConfigMap {}/{}", namespace, name)))?;
        Ok(())
    }
}

/// Map API-server status codes onto the controller taxonomy
fn classify(err: kube::Error, target: &str) -> ControllerError {
    match &err {
        kube::Error::Api(response) if response.code == 409 => {
            ControllerError::Conflict(format!("{}: {}", target, response.message))
        }
        kube::Error::Api(response) if response.code == 404 => {
            ControllerError::NotFound(target.to_string())
        }
        _ => ControllerError::KubeError(err),
    }
}
