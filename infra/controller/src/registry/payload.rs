//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Request bodies for the schema registry
//!
//! Bodies are serialized with `serde_json`, so embedded schema text is
//! escaped structurally: quotes, backslashes and control characters are
//! escaped exactly once and the surrounding document is always valid JSON.

use crate::crd::SchemaFormat;
use crate::ControllerResult;
use serde::Serialize;

#[derive(Serialize)]
struct KeySchema<'a> {
    #[serde(rename = "type")]
    type_: &'a str,
}

#[derive(Serialize)]
struct SchemaPayload<'a> {
    schema: &'a str,
    #[serde(rename = "schemaType", skip_serializing_if = "Option::is_none")]
    schema_type: Option<&'a str>,
}

#[derive(Serialize)]
struct CompatibilityPayload<'a> {
    compatibility: &'a str,
}

/// Builds registry request bodies
pub struct PayloadBuilder;

impl PayloadBuilder {
    /// `{"schema":"{\"type\":\"<serializer>\"}"}`
    pub fn key_schema(serializer: &str) -> ControllerResult<String> {
        let schema = serde_json::to_string(&KeySchema { type_: serializer })?;
        Ok(serde_json::to_string(&SchemaPayload {
            schema: &schema,
            schema_type: None,
        })?)
    }

    /// `{"schema":"<schema text>","schemaType":"<FORMAT>"}`
    ///
    /// JSON-based formats are compacted first; protobuf text is kept as is.
    pub fn value_schema(raw_schema: &str, format: SchemaFormat) -> ControllerResult<String> {
        let schema = if format.is_json_based() {
            compact_schema(raw_schema)
        } else {
            raw_schema.to_string()
        };

        Ok(serde_json::to_string(&SchemaPayload {
            schema: &schema,
            schema_type: Some(format.schema_type()),
        })?)
    }

    /// `{"compatibility":"<LEVEL>"}`. The level is not validated here.
    pub fn compatibility(level: &str) -> ControllerResult<String> {
        Ok(serde_json::to_string(&CompatibilityPayload {
            compatibility: level,
        })?)
    }
}

/// Strip spaces, tabs and line breaks that sit outside string literals.
pub fn compact_schema(raw: &str) -> String {
    let mut compacted = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in raw.chars() {
        if in_string {
            compacted.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            ' ' | '\t' | '\n' | '\r' => {}
            '"' => {
                in_string = true;
                compacted.push(c);
            }
            _ => compacted.push(c),
        }
    }

    compacted
}
