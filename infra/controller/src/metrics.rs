//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Metrics collection for the Kafka schema controller

use metrics::{counter, histogram};
use std::time::Instant;

/// Reconciliation duration histogram
pub const RECONCILE_DURATION: &str = "kafka_schema_reconcile_duration_seconds";
/// Completed reconciliations counter
pub const RECONCILIATIONS_TOTAL: &str = "kafka_schema_reconciliations_total";
/// Failed reconciliations counter
pub const RECONCILIATION_ERRORS_TOTAL: &str = "kafka_schema_reconciliation_errors_total";
/// Registry requests counter, labelled by method and status
pub const REGISTRY_REQUESTS_TOTAL: &str = "kafka_schema_registry_requests_total";

/// Metrics collection for the controller
#[derive(Clone, Debug, Default)]
pub struct Metrics;

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self
    }

    /// Record reconciliation duration
    pub fn record_reconcile_duration(&self, duration: std::time::Duration) {
        histogram!(RECONCILE_DURATION, duration.as_secs_f64());
    }

    /// Increment reconciliation counter
    pub fn increment_reconciliations(&self, phase: &'static str) {
        counter!(RECONCILIATIONS_TOTAL, 1, "phase" => phase);
    }

    /// Increment reconciliation errors counter
    pub fn increment_reconciliation_errors(&self, kind: &'static str) {
        counter!(RECONCILIATION_ERRORS_TOTAL, 1, "kind" => kind);
    }

    /// Count one registry request; `None` status means the transport failed
    pub fn record_registry_request(&self, method: &str, status: Option<u16>) {
        let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());
        counter!(
            REGISTRY_REQUESTS_TOTAL,
            1,
            "method" => method.to_string(),
            "status" => status
        );
    }

    /// Time an async reconciliation operation
    pub async fn time_reconciliation_async<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        self.record_reconcile_duration(start.elapsed());
        result
    }
}
