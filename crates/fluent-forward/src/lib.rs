// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client for the Fluentd [Forward protocol].
//!
//! Events are posted as `(tag, time, record)` triples and written to a Fluentd
//! (or Fluent Bit) collector over TCP or a Unix socket. The client owns the
//! connection and handles reconnection with backoff on its own:
//!
//! ```text
//!   post_with_time()
//!         │
//!         v
//!   ┌─────────────┐
//!   │   Encode    │ (msgpack, Message mode)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐    async mode    ┌──────────────┐
//!   │ Buffer check├─────────────────>│ WriterService│ (background task)
//!   └──────┬──────┘                  └──────┬───────┘
//!          │ sync mode                      │
//!          v                                v
//!   ┌─────────────────────────────────────────────┐
//!   │  Writer: connect, write, read ack, backoff  │
//!   └─────────────────────────────────────────────┘
//! ```
//!
//! [Forward protocol]: https://github.com/fluent/fluentd/wiki/Forward-Protocol-Specification-v1

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod config;
mod connection;
pub mod errors;
pub mod event;
mod writer;

pub use client::FluentClient;
pub use config::{Config, Network};
pub use errors::{EncodeError, Error};
