// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors returned by [`FluentClient`](crate::FluentClient).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode event: {0}")]
    Encode(#[from] EncodeError),

    #[error("buffer full, limit {limit} bytes")]
    BufferFull { limit: usize },

    #[error("failed to write after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("ack chunk {received} != sent {sent}")]
    AckMismatch { sent: String, received: String },

    #[error("client is closed")]
    Closed,
}

/// Errors raised while turning an event into its msgpack representation.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("timestamp precedes the UNIX epoch")]
    TimeBeforeEpoch,

    #[error("timestamp does not fit in an EventTime")]
    TimeOutOfRange,

    #[error("failed to serialize record: {0}")]
    Record(#[from] rmp_serde::encode::Error),

    #[error("failed to write msgpack value: {0}")]
    Write(String),
}
