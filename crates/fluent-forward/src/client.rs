// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public client handle.
//!
//! In sync mode `post_with_time` writes the event itself and, when acks are
//! requested, waits for the collector to confirm it. In async mode events are
//! queued to a background writer task and `post_with_time` returns as soon as
//! the event fits in the buffer.
//!
//! # Backpressure
//!
//! The buffer limit bounds the encoded bytes waiting to be written. Once it is
//! reached further posts fail fast with [`Error::BufferFull`] instead of
//! blocking. In sync mode there is never more than the event being written, so
//! the limit only rejects single events larger than it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::Error;
use crate::event::{self, EncodedEvent};
use crate::writer::{Writer, WriterService};

/// Handle to a Fluentd collector. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct FluentClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<Config>,
    cancel_token: CancellationToken,
    closed: AtomicBool,
    mode: Mode,
}

enum Mode {
    Sync {
        writer: TokioMutex<Writer>,
    },
    Async {
        tx: Mutex<Option<mpsc::UnboundedSender<EncodedEvent>>>,
        pending_bytes: Arc<AtomicUsize>,
        // Failure of a background write, reported by the next post
        last_error: Arc<Mutex<Option<Error>>>,
        worker: TokioMutex<Option<JoinHandle<()>>>,
    },
}

impl FluentClient {
    /// Builds a client.
    ///
    /// In sync mode the connection is established here and a failure is
    /// returned as [`Error::Connect`]. In async mode the background writer
    /// connects on its own and this never touches the network.
    pub async fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let config = Arc::new(config);
        let cancel_token = CancellationToken::new();
        let mut writer = Writer::new(Arc::clone(&config), cancel_token.clone());

        let mode = if config.async_connect {
            let (tx, rx) = mpsc::unbounded_channel();
            let pending_bytes = Arc::new(AtomicUsize::new(0));
            let last_error = Arc::new(Mutex::new(None));
            let service = WriterService::new(
                writer,
                rx,
                Arc::clone(&pending_bytes),
                Arc::clone(&last_error),
                cancel_token.clone(),
            );
            let worker = tokio::spawn(service.run());
            Mode::Async {
                tx: Mutex::new(Some(tx)),
                pending_bytes,
                last_error,
                worker: TokioMutex::new(Some(worker)),
            }
        } else {
            writer.connect().await.map_err(|source| Error::Connect {
                endpoint: config.endpoint(),
                source,
            })?;
            Mode::Sync {
                writer: TokioMutex::new(writer),
            }
        };

        debug!(
            "FLUENT_FORWARD | Client created for {} (async: {}, ack: {})",
            config.endpoint(),
            config.async_connect,
            config.request_ack
        );

        Ok(FluentClient {
            inner: Arc::new(Inner {
                config,
                cancel_token,
                closed: AtomicBool::new(false),
                mode,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Encoded bytes accepted but not yet written. Always zero in sync mode.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        match &self.inner.mode {
            Mode::Sync { .. } => 0,
            Mode::Async { pending_bytes, .. } => pending_bytes.load(Ordering::Acquire),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Posts `record` under `tag`, stamped with the current time.
    pub async fn post<T>(&self, tag: &str, record: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        self.post_with_time(tag, SystemTime::now(), record).await
    }

    /// Posts `record` under `tag` with an explicit timestamp.
    pub async fn post_with_time<T>(
        &self,
        tag: &str,
        time: SystemTime,
        record: &T,
    ) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let config = &self.inner.config;
        let event = event::encode(
            tag,
            time,
            record,
            config.sub_second_precision,
            config.request_ack,
        )?;

        match &self.inner.mode {
            Mode::Sync { writer } => {
                if event.len() > config.buffer_limit {
                    return Err(Error::BufferFull {
                        limit: config.buffer_limit,
                    });
                }
                writer.lock().await.write(&event).await
            }
            Mode::Async {
                tx,
                pending_bytes,
                last_error,
                ..
            } => {
                let previous = last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(e) = previous {
                    return Err(e);
                }

                let size = event.len();
                let limit = config.buffer_limit;
                pending_bytes
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                        pending.checked_add(size).filter(|total| *total <= limit)
                    })
                    .map_err(|_| Error::BufferFull { limit })?;

                let sender = tx.lock().unwrap_or_else(PoisonError::into_inner).clone();
                let queued = match sender {
                    Some(sender) => sender.send(event).is_ok(),
                    None => false,
                };
                if queued {
                    Ok(())
                } else {
                    pending_bytes.fetch_sub(size, Ordering::AcqRel);
                    Err(Error::Closed)
                }
            }
        }
    }

    /// Stops accepting events and shuts the connection down.
    ///
    /// In async mode queued events are written first, for at most the
    /// configured close timeout. Events still queued after that are dropped.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        match &self.inner.mode {
            Mode::Sync { writer } => {
                self.inner.cancel_token.cancel();
                writer.lock().await.disconnect().await;
            }
            Mode::Async {
                tx,
                pending_bytes,
                worker,
                ..
            } => {
                // Dropping the sender lets the writer drain and exit
                drop(tx.lock().unwrap_or_else(PoisonError::into_inner).take());

                let handle = worker.lock().await.take();
                if let Some(mut handle) = handle {
                    let close_timeout = self.inner.config.close_timeout;
                    if tokio::time::timeout(close_timeout, &mut handle)
                        .await
                        .is_err()
                    {
                        warn!(
                            "FLUENT_FORWARD | Close timed out after {} ms with {} bytes pending",
                            close_timeout.as_millis(),
                            pending_bytes.load(Ordering::Acquire)
                        );
                        self.inner.cancel_token.cancel();
                        let _ = handle.await;
                    }
                }
            }
        }
        debug!("FLUENT_FORWARD | Client for {} closed", self.inner.config.endpoint());
    }
}

impl std::fmt::Debug for FluentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluentClient")
            .field("endpoint", &self.inner.config.endpoint())
            .field("async_connect", &self.inner.config.async_connect)
            .field("closed", &self.is_closed())
            .finish()
    }
}
