//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Main controller binary for the Kafka schema controller

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use kafka_schema_controller::{
    Controller, ControllerConfig, ControllerError, ControllerResult, Metrics, CONTROLLER_NAME,
    CONTROLLER_VERSION,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Application state
#[derive(Clone)]
struct AppState {
    /// Prometheus recorder handle
    prometheus: Option<PrometheusHandle>,
    /// Process start time
    started_at: DateTime<Utc>,
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Metrics endpoint
async fn metrics(State(state): State<AppState>) -> String {
    state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Root endpoint with debug information
async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": CONTROLLER_NAME,
        "version": CONTROLLER_VERSION,
        "started_at": state.started_at.to_rfc3339(),
    }))
}

/// Start the HTTP server
async fn start_server(bind_address: String, state: AppState) -> ControllerResult<()> {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| ControllerError::ServerError(format!("bind {}: {}", bind_address, e)))?;
    info!("Starting HTTP server on {}", bind_address);

    axum::serve(listener, app)
        .await
        .map_err(|e| ControllerError::ServerError(e.to_string()))?;

    Ok(())
}

/// Initialize logging
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,kafka_schema_controller=debug".into());

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Install the Prometheus recorder behind the `metrics` facade
fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install Prometheus metrics recorder: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();

    info!("Starting {} v{}", CONTROLLER_NAME, CONTROLLER_VERSION);

    let config = ControllerConfig::load_from_env()?;
    if config.registry.host().is_none() || config.registry.port().is_none() {
        warn!("SCHEMA_REGISTRY_HOST or SCHEMA_REGISTRY_PORT is not set, every reconciliation will fail");
    }

    let state = AppState {
        prometheus: init_metrics(),
        started_at: Utc::now(),
    };

    let server_handle = tokio::spawn(start_server(config.server.bind_address.clone(), state));

    let client = kube::Client::try_default().await?;
    let controller = Controller::new(client, &config, Arc::new(Metrics::new()))?;

    // The controller stops on SIGINT/SIGTERM
    if let Err(e) = controller.run().await {
        error!("Controller failed: {}", e);
    }

    info!("Shutting down...");
    server_handle.abort();

    let _ = tokio::time::timeout(Duration::from_secs(10), async {
        if let Err(e) = server_handle.await {
            if !e.is_cancelled() {
                error!("Server task failed: {:?}", e);
            }
        }
    })
    .await;

    info!("Shutdown complete");
    Ok(())
}
