//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Kubernetes controller wiring for `KafkaSchema` resources

use crate::config::{ControllerConfig, ReconcileConfig};
use crate::crd::KafkaSchema;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::{ReconcileOutcome, Reconciler, RequeueHint};
use crate::registry::{EndpointResolver, RegistryClient};
use crate::store::{KubeStore, ObjectKey};
use crate::ControllerResult;
use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller as KubeController};
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state handed to every reconciliation
pub struct Context {
    reconciler: Reconciler,
    settings: ReconcileConfig,
}

impl Context {
    pub fn new(reconciler: Reconciler, settings: ReconcileConfig) -> Self {
        Self {
            reconciler,
            settings,
        }
    }
}

/// Controller for managing `KafkaSchema` resources
pub struct Controller {
    client: Client,
    context: Arc<Context>,
}

impl Controller {
    /// Create a new controller instance
    pub fn new(client: Client, config: &ControllerConfig, metrics: Arc<Metrics>) -> ControllerResult<Self> {
        let store = Arc::new(KubeStore::new(client.clone()));
        let registry = Arc::new(RegistryClient::new(&config.registry, metrics.clone())?);
        let reconciler = Reconciler::new(
            store,
            registry,
            EndpointResolver::new(&config.registry),
            metrics,
        );

        Ok(Self {
            client,
            context: Arc::new(Context::new(reconciler, config.reconcile.clone())),
        })
    }

    /// Run the controller until a shutdown signal arrives
    pub async fn run(self) -> ControllerResult<()> {
        info!("Starting KafkaSchema controller");

        let schemas: Api<KafkaSchema> = Api::all(self.client.clone());
        KubeController::new(schemas, watcher::Config::default())
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|result| async move {
                match result {
                    Ok((object, action)) => debug!("Reconciled {}: {:?}", object.name, action),
                    Err(e) => warn!("Reconciliation failed: {}", e),
                }
            })
            .await;

        info!("KafkaSchema controller stopped");
        Ok(())
    }
}

async fn reconcile(schema: Arc<KafkaSchema>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = ObjectKey::from_resource(&schema)?;
    let outcome = ctx.reconciler.reconcile(&key).await;
    next_action(outcome, &ctx.settings)
}

fn error_policy(_schema: Arc<KafkaSchema>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    backoff_action(error, &ctx.settings)
}

/// Translate a reconcile outcome into the next scheduling action
pub fn next_action(outcome: ReconcileOutcome, settings: &ReconcileConfig) -> Result<Action, ControllerError> {
    outcome.result?;
    Ok(match outcome.requeue {
        RequeueHint::Requeue => Action::requeue(settings.requeue_interval()),
        RequeueHint::Done => Action::await_change(),
    })
}

/// Backoff after a failed reconciliation
pub fn backoff_action(error: &ControllerError, settings: &ReconcileConfig) -> Action {
    if error.is_conflict() {
        Action::requeue(settings.conflict_backoff())
    } else if error.is_retryable() {
        Action::requeue(settings.error_backoff())
    } else {
        Action::requeue(settings.permanent_error_backoff())
    }
}
