//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! `KafkaSchema` custom resource definition

use kube::{CustomResource, CustomResourceExt, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finalizer that holds a `KafkaSchema` until its subjects are torn down
pub const FINALIZER: &str = "kafka.schema-operator.io/finalizer";

/// Desired state of a key/value subject pair in the schema registry
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "kafka.schema-operator.io",
    version = "v1beta1",
    kind = "KafkaSchema",
    plural = "kafkaschemas",
    shortname = "ksch",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSchemaSpec {
    /// Logical schema name; subjects are `{name}-key` and `{name}-value`
    pub name: String,

    /// Type tag embedded in the key schema
    pub schema_serializer: String,

    /// Re-run reconciliation periodically
    #[serde(default)]
    pub auto_reconciliation: bool,

    /// Soft or permanent subject removal
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,

    /// Keep registry subjects when the resource is deleted
    #[serde(default)]
    pub termination_protection: bool,

    /// Value schema source and registry settings
    pub data: KafkaSchemaData,
}

/// Value schema source
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSchemaData {
    /// Name of the ConfigMap whose `schema` key holds the raw schema text
    pub config_ref: String,

    /// Schema format
    pub format: SchemaFormat,

    /// Compatibility level, passed to the registry verbatim
    pub compatibility: String,
}

/// Subject removal policy
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Subjects can be restored by the registry
    #[default]
    Soft,
    /// Subjects are removed permanently
    Hard,
}

impl DeletionPolicy {
    pub fn is_permanent(self) -> bool {
        self == Self::Hard
    }
}

/// Schema format
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchemaFormat {
    Avro,
    Json,
    Protobuf,
}

impl SchemaFormat {
    /// Registry `schemaType` tag
    pub fn schema_type(self) -> &'static str {
        match self {
            Self::Avro => "AVRO",
            Self::Json => "JSON",
            Self::Protobuf => "PROTOBUF",
        }
    }

    /// Whether the schema text is JSON and whitespace between tokens is insignificant
    pub fn is_json_based(self) -> bool {
        matches!(self, Self::Avro | Self::Json)
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soft => f.write_str("soft"),
            Self::Hard => f.write_str("hard"),
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_type())
    }
}

impl KafkaSchema {
    /// Registry subject holding the key schema
    pub fn key_subject(&self) -> String {
        key_subject(&self.spec.name)
    }

    /// Registry subject holding the value schema
    pub fn value_subject(&self) -> String {
        value_subject(&self.spec.name)
    }

    /// Whether the store has requested removal
    pub fn is_deletion_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the protective finalizer is set
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }
}

pub fn key_subject(name: &str) -> String {
    format!("{}-key", name)
}

pub fn value_subject(name: &str) -> String {
    format!("{}-value", name)
}

/// Render the CRD as YAML
pub fn generate_crd() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&KafkaSchema::crd())
}
