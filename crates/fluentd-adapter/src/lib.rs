// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relays container log messages to a Fluentd collector.
//!
//! ```text
//!  host ──mpsc<Message>──▶ FluentdAdapter::stream ──(tag, time, record)──▶ FluentClient ──▶ collector
//! ```
//!
//! The host builds an [`AdapterFactories`] map, resolves a [`Route`] through it
//! and spawns the resulting adapter's `stream` on the receiving end of a
//! channel. Every message is tagged, filtered and posted in receive order;
//! delivery failures are logged and never stop the loop.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod adapter;
pub mod address;
pub mod config;
pub mod error;
pub mod message;
pub mod router;
pub mod transport;

pub use adapter::{FluentdAdapter, FluentdFactory, Record, RecordWriter};
pub use error::AdapterError;
pub use message::{Container, ContainerConfig, Message};
pub use router::{AdapterFactories, AdapterFactory, FactoryContext, LogAdapter, Route};
pub use transport::{AdapterTransports, TcpTransport, Transport};
