// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

use crate::address::AddressError;
use crate::config::ConfigError;

/// Failures while resolving a route into a running adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid route {route}: {reason}")]
    InvalidRoute { route: String, reason: &'static str },

    #[error("unable to find adapter: {0}")]
    AdapterNotFound(String),

    #[error("unable to find transport {transport} for adapter {adapter}")]
    TransportNotFound { adapter: String, transport: String },

    #[error("failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid fluentd address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] fluent_forward::Error),
}
