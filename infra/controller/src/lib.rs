//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Kubernetes controller for Kafka schema registry subjects
//!
//! Each `KafkaSchema` resource describes a key/value subject pair
//! (`{name}-key`, `{name}-value`) in a Confluent-compatible schema registry.
//! The controller publishes both schemas, applies the compatibility level,
//! and removes the subjects when the resource is deleted, unless
//! termination protection is set.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod store;

/// Re-export main components
pub use self::config::{ControllerConfig, ReconcileConfig, RegistryConfig, ServerConfig};
pub use controller::Controller;
pub use crd::{DeletionPolicy, KafkaSchema, KafkaSchemaData, KafkaSchemaSpec, SchemaFormat, FINALIZER};
pub use error::ControllerError;
pub use lifecycle::{LifecycleGuard, LifecyclePhase};
pub use self::metrics::Metrics;
pub use reconciler::{ReconcileOutcome, Reconciler, RequeueHint};
pub use registry::{EndpointResolver, PayloadBuilder, RegistryClient, RegistryTransport};
pub use store::{ConfigBlob, KubeStore, MemoryStore, ObjectKey, ResourceStore};

/// Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Controller version
pub const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Controller name
pub const CONTROLLER_NAME: &str = "kafka-schema-controller";
