// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::errors::Error;
use crate::event::EncodedEvent;

enum WriteFailure {
    /// Connection level failure, worth reconnecting and retrying
    Transient(io::Error),
    Fatal(Error),
}

impl From<io::Error> for WriteFailure {
    fn from(e: io::Error) -> Self {
        WriteFailure::Transient(e)
    }
}

/// Owns the connection and the retry loop.
pub(crate) struct Writer {
    config: Arc<Config>,
    conn: Option<Connection>,
    cancel_token: CancellationToken,
}

impl Writer {
    pub(crate) fn new(config: Arc<Config>, cancel_token: CancellationToken) -> Self {
        Writer {
            config,
            conn: None,
            cancel_token,
        }
    }

    pub(crate) async fn connect(&mut self) -> io::Result<()> {
        if self.conn.is_none() {
            self.conn = Some(Connection::open(&self.config).await?);
            debug!("FLUENT_FORWARD | Connected to {}", self.config.endpoint());
        }
        Ok(())
    }

    pub(crate) async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.shutdown().await;
        }
    }

    /// Writes one event, reconnecting with backoff until the retry budget runs out.
    pub(crate) async fn write(&mut self, event: &EncodedEvent) -> Result<(), Error> {
        let mut retries: u32 = 0;

        loop {
            let failure = match self.try_write(event).await {
                Ok(()) => return Ok(()),
                Err(WriteFailure::Fatal(e)) => {
                    self.disconnect().await;
                    return Err(e);
                }
                Err(WriteFailure::Transient(e)) => e,
            };
            self.disconnect().await;

            if !self.config.can_retry(retries) {
                return Err(Error::RetriesExhausted {
                    attempts: retries.saturating_add(1),
                    source: failure,
                });
            }

            let wait = self.config.backoff(retries);
            retries = retries.saturating_add(1);
            debug!(
                "FLUENT_FORWARD | Write to {} failed (attempt {}): {}. Retrying in {} ms",
                self.config.endpoint(),
                retries,
                failure,
                wait.as_millis()
            );

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = self.cancel_token.cancelled() => return Err(Error::Closed),
            }
        }
    }

    async fn try_write(&mut self, event: &EncodedEvent) -> Result<(), WriteFailure> {
        self.connect().await?;
        let Some(conn) = self.conn.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected).into());
        };

        conn.write_all(event.as_bytes(), self.config.write_timeout)
            .await?;

        if let Some(chunk) = event.chunk() {
            let response = conn.read_ack(self.config.ack_timeout).await?;
            if response.ack != chunk {
                return Err(WriteFailure::Fatal(Error::AckMismatch {
                    sent: chunk.to_string(),
                    received: response.ack,
                }));
            }
        }
        Ok(())
    }
}

/// Background task draining queued events in async mode.
pub(crate) struct WriterService {
    writer: Writer,
    rx: mpsc::UnboundedReceiver<EncodedEvent>,
    pending_bytes: Arc<AtomicUsize>,
    last_error: Arc<Mutex<Option<Error>>>,
    cancel_token: CancellationToken,
}

impl WriterService {
    pub(crate) fn new(
        writer: Writer,
        rx: mpsc::UnboundedReceiver<EncodedEvent>,
        pending_bytes: Arc<AtomicUsize>,
        last_error: Arc<Mutex<Option<Error>>>,
        cancel_token: CancellationToken,
    ) -> Self {
        WriterService {
            writer,
            rx,
            pending_bytes,
            last_error,
            cancel_token,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("FLUENT_FORWARD | Writer service started");

        if let Err(e) = self.writer.connect().await {
            warn!(
                "FLUENT_FORWARD | Initial connection to {} failed, will retry on first write: {}",
                self.writer.config.endpoint(),
                e
            );
        }

        let mut abandoned = 0usize;
        while let Some(event) = self.rx.recv().await {
            let size = event.len();
            if self.cancel_token.is_cancelled() {
                abandoned += 1;
            } else if let Err(e) = self.writer.write(&event).await {
                error!("FLUENT_FORWARD | Dropping event of {} bytes: {}", size, e);
                *self
                    .last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(e);
            }
            self.pending_bytes.fetch_sub(size, Ordering::AcqRel);
        }

        if abandoned > 0 {
            warn!(
                "FLUENT_FORWARD | Abandoned {} queued events on shutdown",
                abandoned
            );
        }
        self.writer.disconnect().await;
        debug!("FLUENT_FORWARD | Writer service stopped");
    }
}
