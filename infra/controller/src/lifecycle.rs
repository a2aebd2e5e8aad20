//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Finalizer handling and the lifecycle phase of a `KafkaSchema`

use crate::crd::{KafkaSchema, FINALIZER};
use crate::store::ResourceStore;
use crate::ControllerResult;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle phase derived from the observed record on every invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No deletion requested: converge the registry
    Active,
    /// Deletion requested and the finalizer still holds the record: tear down
    TeardownPending,
    /// Deletion requested but termination protection is on: leave as is
    Protected,
    /// Deletion requested and our finalizer is already gone, while other
    /// finalizers still hold the record: finish any teardown left undone
    Purged,
}

impl LifecyclePhase {
    pub fn derive(deletion_requested: bool, protected: bool, finalizer_present: bool) -> Self {
        match (deletion_requested, protected, finalizer_present) {
            (false, _, _) => Self::Active,
            (true, true, _) => Self::Protected,
            (true, false, true) => Self::TeardownPending,
            (true, false, false) => Self::Purged,
        }
    }

    pub fn of(schema: &KafkaSchema) -> Self {
        Self::derive(
            schema.is_deletion_requested(),
            schema.spec.termination_protection,
            schema.has_finalizer(),
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::TeardownPending => "teardown_pending",
            Self::Protected => "protected",
            Self::Purged => "purged",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adds and removes the protective finalizer, writing only when needed
#[derive(Clone)]
pub struct LifecycleGuard {
    store: Arc<dyn ResourceStore>,
}

impl LifecycleGuard {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Ensure the finalizer is set. Returns whether a write happened.
    pub async fn ensure_present(&self, schema: &KafkaSchema) -> ControllerResult<bool> {
        if schema.has_finalizer() {
            debug!("Finalizer already set for KafkaSchema {}", schema.name_any());
            return Ok(false);
        }

        let mut updated = schema.clone();
        updated.finalizers_mut().push(FINALIZER.to_string());
        self.store.update_schema(&updated).await?;
        info!("Finalizer set for KafkaSchema {}", schema.name_any());
        Ok(true)
    }

    /// Ensure the finalizer is removed. Returns whether a write happened.
    pub async fn ensure_absent(&self, schema: &KafkaSchema) -> ControllerResult<bool> {
        if !schema.has_finalizer() {
            debug!("Finalizer already absent for KafkaSchema {}", schema.name_any());
            return Ok(false);
        }

        let mut updated = schema.clone();
        updated.finalizers_mut().retain(|f| f != FINALIZER);
        self.store.update_schema(&updated).await?;
        info!("Finalizer removed from KafkaSchema {}", schema.name_any());
        Ok(true)
    }
}
