// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Connectivity probe for a route address.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, address: &str, options: &HashMap<String, String>) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        TcpTransport { timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        TcpTransport::new(DEFAULT_DIAL_TIMEOUT)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn dial(&self, address: &str, _options: &HashMap<String, String>) -> io::Result<()> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("dial timed out after {} ms", self.timeout.as_millis()),
                )
            })??;
        debug!(
            "FLUENTD | Dialed {} from {}",
            address,
            stream
                .local_addr()
                .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string())
        );
        Ok(())
    }
}

/// Transports by name, e.g. the `tcp` in `fluentd+tcp://`.
#[derive(Clone)]
pub struct AdapterTransports {
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl AdapterTransports {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        AdapterTransports {
            transports: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, transport: Arc<dyn Transport>) {
        self.transports.insert(name.to_string(), transport);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(name).cloned()
    }
}

impl Default for AdapterTransports {
    /// A registry with `tcp` registered.
    fn default() -> Self {
        let mut transports = AdapterTransports::new();
        transports.register("tcp", Arc::new(TcpTransport::default()));
        transports
    }
}

impl std::fmt::Debug for AdapterTransports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.transports.keys().collect();
        names.sort();
        f.debug_struct("AdapterTransports")
            .field("transports", &names)
            .finish()
    }
}
