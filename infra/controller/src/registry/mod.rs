//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Schema registry access: endpoint resolution, request bodies and transport

pub mod client;
pub mod endpoints;
pub mod payload;

pub use client::{RegistryClient, RegistryTransport, REGISTRY_CONTENT_TYPE};
pub use endpoints::EndpointResolver;
pub use payload::{compact_schema, PayloadBuilder};
