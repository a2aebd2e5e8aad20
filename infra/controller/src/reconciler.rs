//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Reconciliation of `KafkaSchema` resources against the schema registry
//!
//! One invocation reads the record and its schema ConfigMap, derives the
//! lifecycle phase and issues the registry calls for that phase strictly in
//! sequence. The first failure aborts the invocation; nothing already applied
//! is rolled back; a later invocation converges the registry instead.

use crate::crd::KafkaSchema;
use crate::error::ControllerError;
use crate::lifecycle::{LifecycleGuard, LifecyclePhase};
use crate::metrics::Metrics;
use crate::registry::{EndpointResolver, PayloadBuilder, RegistryTransport};
use crate::store::{ConfigBlob, ObjectKey, ResourceStore};
use crate::ControllerResult;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Whether the caller should invoke the loop again for this resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueHint {
    /// `autoReconciliation` is set: run again periodically
    Requeue,
    /// Single shot: wait for the next change
    Done,
}

impl RequeueHint {
    pub fn from_auto_reconciliation(auto_reconciliation: bool) -> Self {
        if auto_reconciliation {
            Self::Requeue
        } else {
            Self::Done
        }
    }
}

/// Result of one invocation paired with the requeue hint
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub requeue: RequeueHint,
    /// Phase the record was in, `None` when it could not be read
    pub phase: Option<LifecyclePhase>,
    pub result: ControllerResult<()>,
}

impl ReconcileOutcome {
    fn new(requeue: RequeueHint, phase: Option<LifecyclePhase>, result: ControllerResult<()>) -> Self {
        Self {
            requeue,
            phase,
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives the registry toward the state described by `KafkaSchema` records
pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    registry: Arc<dyn RegistryTransport>,
    endpoints: EndpointResolver,
    guard: LifecycleGuard,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        registry: Arc<dyn RegistryTransport>,
        endpoints: EndpointResolver,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            guard: LifecycleGuard::new(store.clone()),
            store,
            registry,
            endpoints,
            metrics,
        }
    }

    /// Reconcile one resource
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcileOutcome {
        let outcome = self
            .metrics
            .time_reconciliation_async(|| self.reconcile_resource(key))
            .await;

        match &outcome.result {
            Ok(()) => {
                let phase = outcome.phase.map_or("absent", LifecyclePhase::as_str);
                self.metrics.increment_reconciliations(phase);
            }
            Err(e) => {
                self.metrics.increment_reconciliation_errors(e.kind());
                error!("Failed to reconcile KafkaSchema {}: {}", key, e);
            }
        }
        outcome
    }

    async fn reconcile_resource(&self, key: &ObjectKey) -> ReconcileOutcome {
        debug!("Reconciling KafkaSchema {}", key);

        let schema = match self.store.get_schema(key).await {
            Ok(Some(schema)) => schema,
            Ok(None) | Err(ControllerError::NotFound(_)) => {
                info!("KafkaSchema {} not found, ignoring since it must be deleted", key);
                return ReconcileOutcome::new(RequeueHint::Done, None, Ok(()));
            }
            Err(e) => return ReconcileOutcome::new(RequeueHint::Done, None, Err(e)),
        };

        let requeue = RequeueHint::from_auto_reconciliation(schema.spec.auto_reconciliation);
        let phase = LifecyclePhase::of(&schema);
        debug!("KafkaSchema {} is {}", key, phase);

        let blob = match self
            .store
            .get_config_blob(&key.namespace, &schema.spec.data.config_ref)
            .await
        {
            Ok(blob) => blob,
            Err(e) => {
                error!(
                    "Failed to fetch ConfigMap {}/{} for KafkaSchema {}",
                    key.namespace, schema.spec.data.config_ref, key
                );
                return ReconcileOutcome::new(requeue, Some(phase), Err(e));
            }
        };

        match phase {
            LifecyclePhase::Active => {
                let result = self.converge(&schema, &blob).await;
                ReconcileOutcome::new(requeue, Some(phase), result)
            }
            LifecyclePhase::TeardownPending | LifecyclePhase::Purged => {
                let result = self.teardown(&schema, &blob).await;
                ReconcileOutcome::new(RequeueHint::Done, Some(phase), result)
            }
            LifecyclePhase::Protected => {
                info!(
                    "KafkaSchema {} has termination protection, keeping subjects {} and {}",
                    key,
                    schema.key_subject(),
                    schema.value_subject()
                );
                ReconcileOutcome::new(RequeueHint::Done, Some(phase), Ok(()))
            }
        }
    }

    /// Publish key and value schemas, then set compatibility on both subjects
    async fn converge(&self, schema: &KafkaSchema, blob: &ConfigBlob) -> ControllerResult<()> {
        self.guard.ensure_present(schema).await?;

        let key_subject = schema.key_subject();
        let value_subject = schema.value_subject();

        let key_versions_url = self.endpoints.versions_url(&key_subject)?;
        let value_versions_url = self.endpoints.versions_url(&value_subject)?;
        let value_compatibility_url = self.endpoints.compatibility_url(&value_subject)?;
        let key_compatibility_url = self.endpoints.compatibility_url(&key_subject)?;

        let key_payload = PayloadBuilder::key_schema(&schema.spec.schema_serializer)?;
        let value_payload = PayloadBuilder::value_schema(&blob.schema, schema.spec.data.format)?;
        let compatibility_payload = PayloadBuilder::compatibility(&schema.spec.data.compatibility)?;

        self.send(Method::POST, &key_versions_url, Some(key_payload), "publish key schema")
            .await?;
        info!("Schema key was published: {}", key_subject);

        self.send(
            Method::POST,
            &value_versions_url,
            Some(value_payload),
            "publish value schema",
        )
        .await?;
        info!(
            "Schema value was published: {} ({})",
            value_subject, schema.spec.data.format
        );

        self.send(
            Method::PUT,
            &value_compatibility_url,
            Some(compatibility_payload.clone()),
            "set value compatibility",
        )
        .await?;
        self.send(
            Method::PUT,
            &key_compatibility_url,
            Some(compatibility_payload),
            "set key compatibility",
        )
        .await?;
        info!(
            "Compatibility {} set for {} and {}",
            schema.spec.data.compatibility, value_subject, key_subject
        );

        Ok(())
    }

    /// Release the record, delete its ConfigMap, then delete both subjects
    async fn teardown(&self, schema: &KafkaSchema, blob: &ConfigBlob) -> ControllerResult<()> {
        let policy = schema.spec.deletion_policy;
        let key_subject = schema.key_subject();
        let value_subject = schema.value_subject();

        let key_deletion_url = self.endpoints.deletion_url(&key_subject, policy)?;
        let value_deletion_url = self.endpoints.deletion_url(&value_subject, policy)?;

        self.guard.ensure_absent(schema).await?;

        self.store
            .delete_config_blob(&blob.namespace, &blob.name)
            .await?;
        info!("ConfigMap was deleted: {}/{}", blob.namespace, blob.name);

        self.send(Method::DELETE, &key_deletion_url, None, "delete key subject")
            .await?;
        self.send(Method::DELETE, &value_deletion_url, None, "delete value subject")
            .await?;
        info!(
            "Subjects {} and {} removed from registry, deletion policy {}",
            key_subject, value_subject, policy
        );

        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        operation: &str,
    ) -> ControllerResult<()> {
        self.registry
            .send(method, url, body)
            .await
            .inspect_err(|e| error!("Failed to {}: {}", operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::crd::{DeletionPolicy, KafkaSchemaData, KafkaSchemaSpec, SchemaFormat, FINALIZER};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use kube::ResourceExt;
    use std::sync::Mutex;

    type Call = (Method, String, Option<String>);

    /// Records calls; optionally fails the call at a given index
    #[derive(Default)]
    struct RecordingRegistry {
        calls: Mutex<Vec<Call>>,
        fail_at: Option<(usize, u16)>,
    }

    impl RecordingRegistry {
        fn failing_at(index: usize, status: u16) -> Self {
            Self {
                fail_at: Some((index, status)),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RegistryTransport for RecordingRegistry {
        async fn send(&self, method: Method, url: &str, body: Option<String>) -> ControllerResult<()> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push((method.clone(), url.to_string(), body));
            match self.fail_at {
                Some((at, status)) if at == index => Err(ControllerError::RegistryError {
                    method: method.to_string(),
                    url: url.to_string(),
                    status,
                    body: "{\"error_code\":50001}".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    /// Touches the stored record before every update so the write goes stale
    struct ConcurrentWriterStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl ResourceStore for ConcurrentWriterStore {
        async fn get_schema(&self, key: &ObjectKey) -> ControllerResult<Option<KafkaSchema>> {
            self.inner.get_schema(key).await
        }

        async fn update_schema(&self, schema: &KafkaSchema) -> ControllerResult<KafkaSchema> {
            let key = ObjectKey::from_resource(schema)?;
            if let Some(current) = self.inner.schema(&key).await {
                self.inner.apply_schema(current).await?;
            }
            self.inner.update_schema(schema).await
        }

        async fn get_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<ConfigBlob> {
            self.inner.get_config_blob(namespace, name).await
        }

        async fn delete_config_blob(&self, namespace: &str, name: &str) -> ControllerResult<()> {
            self.inner.delete_config_blob(namespace, name).await
        }
    }

    const BASE: &str = "http://registry:8081";

    fn spec() -> KafkaSchemaSpec {
        KafkaSchemaSpec {
            name: "orders".to_string(),
            schema_serializer: "string".to_string(),
            auto_reconciliation: false,
            deletion_policy: DeletionPolicy::Soft,
            termination_protection: false,
            data: KafkaSchemaData {
                config_ref: "orders-schema".to_string(),
                format: SchemaFormat::Avro,
                compatibility: "BACKWARD".to_string(),
            },
        }
    }

    fn resource(spec: KafkaSchemaSpec) -> KafkaSchema {
        let mut schema = KafkaSchema::new("orders", spec);
        schema.metadata.namespace = Some("default".to_string());
        schema
    }

    async fn seeded_store(spec: KafkaSchemaSpec) -> (Arc<MemoryStore>, ObjectKey) {
        let store = Arc::new(MemoryStore::new());
        store
            .apply_config_blob("default", "orders-schema", "{\"type\": \"record\"}")
            .await;
        let key = store.apply_schema(resource(spec)).await.unwrap();
        (store, key)
    }

    fn build_reconciler(
        store: Arc<dyn ResourceStore>,
        registry: Arc<RecordingRegistry>,
        config: RegistryConfig,
    ) -> Reconciler {
        Reconciler::new(
            store,
            registry,
            EndpointResolver::new(&config),
            Arc::new(Metrics::new()),
        )
    }

    fn registry_config() -> RegistryConfig {
        RegistryConfig::new("registry", "8081")
    }

    fn convergence_calls() -> Vec<Call> {
        vec![
            (
                Method::POST,
                format!("{}/subjects/orders-key/versions", BASE),
                Some(r#"{"schema":"{\"type\":\"string\"}"}"#.to_string()),
            ),
            (
                Method::POST,
                format!("{}/subjects/orders-value/versions", BASE),
                Some(r#"{"schema":"{\"type\":\"record\"}","schemaType":"AVRO"}"#.to_string()),
            ),
            (
                Method::PUT,
                format!("{}/config/orders-value", BASE),
                Some(r#"{"compatibility":"BACKWARD"}"#.to_string()),
            ),
            (
                Method::PUT,
                format!("{}/config/orders-key", BASE),
                Some(r#"{"compatibility":"BACKWARD"}"#.to_string()),
            ),
        ]
    }

    #[tokio::test]
    async fn test_convergence_sequence() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        let outcome = reconciler.reconcile(&key).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.requeue, RequeueHint::Done);
        assert_eq!(outcome.phase, Some(LifecyclePhase::Active));
        assert_eq!(registry.calls(), convergence_calls());
        assert!(store.schema(&key).await.unwrap().has_finalizer());
    }

    #[tokio::test]
    async fn test_convergence_is_repeatable() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        assert!(reconciler.reconcile(&key).await.is_ok());
        assert!(reconciler.reconcile(&key).await.is_ok());

        let mut expected = convergence_calls();
        expected.extend(convergence_calls());
        assert_eq!(registry.calls(), expected);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_reconciliation_requests_requeue_even_on_failure() {
        let mut spec = spec();
        spec.auto_reconciliation = true;
        let (store, key) = seeded_store(spec).await;
        let registry = Arc::new(RecordingRegistry::failing_at(0, 500));
        let reconciler = build_reconciler(store, registry, registry_config());

        let outcome = reconciler.reconcile(&key).await;

        assert_eq!(outcome.requeue, RequeueHint::Requeue);
        assert!(matches!(
            outcome.result,
            Err(ControllerError::RegistryError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_resource_is_done() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store, registry.clone(), registry_config());

        let outcome = reconciler.reconcile(&ObjectKey::new("default", "gone")).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.requeue, RequeueHint::Done);
        assert_eq!(outcome.phase, None);
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_blob_aborts_before_registry_calls() {
        let store = Arc::new(MemoryStore::new());
        let key = store.apply_schema(resource(spec())).await.unwrap();
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        let outcome = reconciler.reconcile(&key).await;

        assert!(matches!(outcome.result, Err(ControllerError::NotFound(_))));
        assert!(registry.calls().is_empty());
        assert!(!store.schema(&key).await.unwrap().has_finalizer());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining_calls() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::failing_at(1, 422));
        let reconciler = build_reconciler(store, registry.clone(), registry_config());

        let outcome = reconciler.reconcile(&key).await;

        assert!(matches!(
            outcome.result,
            Err(ControllerError::RegistryError { status: 422, .. })
        ));
        assert_eq!(registry.calls(), convergence_calls()[..2].to_vec());
    }

    #[tokio::test]
    async fn test_protection_gate() {
        let mut spec = spec();
        spec.termination_protection = true;
        let (store, key) = seeded_store(spec).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        assert!(reconciler.reconcile(&key).await.is_ok());
        store.request_deletion(&key).await.unwrap();
        registry.calls.lock().unwrap().clear();

        let outcome = reconciler.reconcile(&key).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.phase, Some(LifecyclePhase::Protected));
        assert!(registry.calls().is_empty());
        let schema = store.schema(&key).await.unwrap();
        assert!(schema.has_finalizer());
        assert!(store.has_config_blob("default", "orders-schema").await);
    }

    #[tokio::test]
    async fn test_teardown_hard_policy() {
        let mut spec = spec();
        spec.deletion_policy = DeletionPolicy::Hard;
        spec.auto_reconciliation = true;
        let (store, key) = seeded_store(spec).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        assert!(reconciler.reconcile(&key).await.is_ok());
        store.request_deletion(&key).await.unwrap();
        registry.calls.lock().unwrap().clear();

        let outcome = reconciler.reconcile(&key).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.phase, Some(LifecyclePhase::TeardownPending));
        assert_eq!(outcome.requeue, RequeueHint::Done);
        assert_eq!(
            registry.calls(),
            vec![
                (
                    Method::DELETE,
                    format!("{}/subjects/orders-key?permanent=true", BASE),
                    None
                ),
                (
                    Method::DELETE,
                    format!("{}/subjects/orders-value?permanent=true", BASE),
                    None
                ),
            ]
        );
        assert!(store.schema(&key).await.is_none());
        assert!(!store.has_config_blob("default", "orders-schema").await);
    }

    #[tokio::test]
    async fn test_teardown_runs_after_finalizer_is_gone() {
        let mut spec = spec();
        spec.deletion_policy = DeletionPolicy::Hard;
        let mut schema = resource(spec);
        schema.metadata.finalizers = Some(vec!["other.io/finalizer".to_string()]);

        let store = Arc::new(MemoryStore::new());
        store
            .apply_config_blob("default", "orders-schema", "{\"type\": \"record\"}")
            .await;
        let key = store.apply_schema(schema).await.unwrap();
        store.request_deletion(&key).await.unwrap();

        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());
        let outcome = reconciler.reconcile(&key).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.phase, Some(LifecyclePhase::Purged));
        assert_eq!(
            registry.calls(),
            vec![
                (
                    Method::DELETE,
                    format!("{}/subjects/orders-key?permanent=true", BASE),
                    None
                ),
                (
                    Method::DELETE,
                    format!("{}/subjects/orders-value?permanent=true", BASE),
                    None
                ),
            ]
        );
        // Another controller's finalizer still holds the record.
        assert!(store.schema(&key).await.is_some());
        assert_eq!(store.write_count(), 0);
        assert!(!store.has_config_blob("default", "orders-schema").await);
    }

    #[tokio::test]
    async fn test_teardown_resumes_after_partial_failure() {
        let mut schema = resource(spec());
        schema.metadata.finalizers =
            Some(vec![FINALIZER.to_string(), "other.io/finalizer".to_string()]);

        let store = Arc::new(MemoryStore::new());
        store
            .apply_config_blob("default", "orders-schema", "{\"type\": \"record\"}")
            .await;
        let key = store.apply_schema(schema).await.unwrap();
        store.request_deletion(&key).await.unwrap();

        // Value deletion fails after the finalizer and ConfigMap are gone.
        let failing = Arc::new(RecordingRegistry::failing_at(1, 500));
        let outcome = build_reconciler(store.clone(), failing.clone(), registry_config())
            .reconcile(&key)
            .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.phase, Some(LifecyclePhase::TeardownPending));
        assert!(!store.schema(&key).await.unwrap().has_finalizer());

        store
            .apply_config_blob("default", "orders-schema", "{\"type\": \"record\"}")
            .await;
        let registry = Arc::new(RecordingRegistry::default());
        let outcome = build_reconciler(store.clone(), registry.clone(), registry_config())
            .reconcile(&key)
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.phase, Some(LifecyclePhase::Purged));
        let urls: Vec<String> = registry.calls().into_iter().map(|(_, url, _)| url).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/subjects/orders-key", BASE),
                format!("{}/subjects/orders-value", BASE),
            ]
        );
    }

    #[tokio::test]
    async fn test_teardown_soft_policy() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());

        assert!(reconciler.reconcile(&key).await.is_ok());
        store.request_deletion(&key).await.unwrap();
        registry.calls.lock().unwrap().clear();

        assert!(reconciler.reconcile(&key).await.is_ok());
        let urls: Vec<String> = registry.calls().into_iter().map(|(_, url, _)| url).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/subjects/orders-key", BASE),
                format!("{}/subjects/orders-value", BASE),
            ]
        );
    }

    #[tokio::test]
    async fn test_teardown_aborts_on_key_deletion_failure() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store.clone(), registry.clone(), registry_config());
        assert!(reconciler.reconcile(&key).await.is_ok());
        store.request_deletion(&key).await.unwrap();

        let failing = Arc::new(RecordingRegistry::failing_at(0, 404));
        let teardown = build_reconciler(store.clone(), failing.clone(), registry_config());
        let outcome = teardown.reconcile(&key).await;

        assert!(matches!(
            outcome.result,
            Err(ControllerError::RegistryError { status: 404, .. })
        ));
        assert_eq!(failing.calls().len(), 1);
        assert!(store.schema(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_configuration_gate_on_both_paths() {
        let (store, key) = seeded_store(spec()).await;
        let registry = Arc::new(RecordingRegistry::default());
        let unset = RegistryConfig::default();
        let reconciler = build_reconciler(store.clone(), registry.clone(), unset);

        let outcome = reconciler.reconcile(&key).await;
        assert!(matches!(
            outcome.result,
            Err(ControllerError::ConfigurationError(_))
        ));

        // The finalizer is set before endpoints are resolved.
        let schema = store.schema(&key).await.unwrap();
        assert_eq!(schema.finalizers(), &[FINALIZER.to_string()]);
        store.request_deletion(&key).await.unwrap();

        let outcome = reconciler.reconcile(&key).await;
        assert!(matches!(
            outcome.result,
            Err(ControllerError::ConfigurationError(_))
        ));
        assert!(registry.calls().is_empty());
        assert!(store.schema(&key).await.unwrap().has_finalizer());
    }

    #[tokio::test]
    async fn test_finalizer_conflict_aborts_before_registry_calls() {
        let (inner, key) = seeded_store(spec()).await;
        let store = Arc::new(ConcurrentWriterStore {
            inner: inner.clone(),
        });
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = build_reconciler(store, registry.clone(), registry_config());

        let outcome = reconciler.reconcile(&key).await;

        assert!(matches!(outcome.result, Err(ControllerError::Conflict(_))));
        assert!(registry.calls().is_empty());
    }
}
