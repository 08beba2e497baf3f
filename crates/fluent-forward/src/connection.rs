// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::{Config, Network};
use crate::event::AckResponse;

// An ack is a one-entry map; anything larger is not an ack
const MAX_ACK_SIZE: usize = 4096;

/// Wire connection to the collector.
pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

fn timed_out(what: &str, after: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{what} timed out after {} ms", after.as_millis()),
    )
}

impl Connection {
    pub(crate) async fn open(config: &Config) -> io::Result<Connection> {
        timeout(config.timeout, Self::connect(config))
            .await
            .map_err(|_| timed_out("connect", config.timeout))?
    }

    async fn connect(config: &Config) -> io::Result<Connection> {
        match config.network {
            Network::Tcp => {
                let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
                stream.set_nodelay(true)?;
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Network::Unix => {
                let path = config.socket_path.as_deref().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "missing socket path")
                })?;
                Ok(Connection::Unix(UnixStream::connect(path).await?))
            }
            #[cfg(not(unix))]
            Network::Unix => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    pub(crate) async fn write_all(
        &mut self,
        data: &[u8],
        write_timeout: Option<Duration>,
    ) -> io::Result<()> {
        let write = async {
            match self {
                Connection::Tcp(stream) => {
                    stream.write_all(data).await?;
                    stream.flush().await
                }
                #[cfg(unix)]
                Connection::Unix(stream) => {
                    stream.write_all(data).await?;
                    stream.flush().await
                }
            }
        };

        match write_timeout {
            Some(limit) => timeout(limit, write)
                .await
                .map_err(|_| timed_out("write", limit))?,
            None => write.await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.read(buf).await,
            #[cfg(unix)]
            Connection::Unix(stream) => stream.read(buf).await,
        }
    }

    /// Reads one `{"ack": chunk}` response.
    pub(crate) async fn read_ack(&mut self, ack_timeout: Duration) -> io::Result<AckResponse> {
        let read = async {
            let mut received = Vec::new();
            let mut buf = [0u8; 512];
            loop {
                let n = self.read(&mut buf).await?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before ack",
                    ));
                }
                received.extend_from_slice(&buf[..n]);

                match rmp_serde::from_slice::<AckResponse>(&received) {
                    Ok(ack) => return Ok(ack),
                    // Partial response, keep reading
                    Err(
                        rmp_serde::decode::Error::InvalidMarkerRead(e)
                        | rmp_serde::decode::Error::InvalidDataRead(e),
                    ) if e.kind() == io::ErrorKind::UnexpectedEof
                        && received.len() < MAX_ACK_SIZE => {}
                    Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                }
            }
        };

        timeout(ack_timeout, read)
            .await
            .map_err(|_| timed_out("ack", ack_timeout))?
    }

    pub(crate) async fn shutdown(&mut self) {
        let _ = match self {
            Connection::Tcp(stream) => stream.shutdown().await,
            #[cfg(unix)]
            Connection::Unix(stream) => stream.shutdown().await,
        };
    }
}
