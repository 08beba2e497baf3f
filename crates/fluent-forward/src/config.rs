// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Connection, buffering and retry settings for [`FluentClient`](crate::FluentClient).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 24224;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BUFFER_LIMIT: usize = 8 * 1024 * 1024;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_RETRY_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRY: u32 = 13;

// Growth factor applied to the retry wait after each failed attempt
const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Socket family used to reach the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Network {
    #[default]
    Tcp,
    Unix,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            other => Err(Error::Config(format!("unknown network {other:?}"))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Unix => write!(f, "unix"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub network: Network,
    /// Socket path, only used with [`Network::Unix`]
    pub socket_path: Option<PathBuf>,
    /// Connect timeout
    pub timeout: Duration,
    pub write_timeout: Option<Duration>,
    /// How long to wait for the collector to acknowledge a chunk
    pub ack_timeout: Duration,
    /// How long `close` waits for queued events before abandoning them
    pub close_timeout: Duration,
    /// Upper bound, in bytes, of encoded events waiting to be written
    pub buffer_limit: usize,
    /// Wait before the first retry. Later retries grow by 1.5x.
    pub retry_wait: Duration,
    pub max_retry_wait: Duration,
    /// Retries allowed after the first attempt. `None` retries forever.
    pub max_retry: Option<u32>,
    /// Queue events and write them from a background task
    pub async_connect: bool,
    /// Encode timestamps as `EventTime` (nanosecond resolution)
    pub sub_second_precision: bool,
    /// Ask the collector to acknowledge every event
    pub request_ack: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            network: Network::Tcp,
            socket_path: None,
            timeout: DEFAULT_TIMEOUT,
            write_timeout: None,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            retry_wait: DEFAULT_RETRY_WAIT,
            max_retry_wait: DEFAULT_MAX_RETRY_WAIT,
            max_retry: Some(DEFAULT_MAX_RETRY),
            async_connect: false,
            sub_second_precision: false,
            request_ack: false,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        match self.network {
            Network::Tcp if self.host.is_empty() => {
                return Err(Error::Config("host must not be empty".to_string()));
            }
            Network::Unix if self.socket_path.is_none() => {
                return Err(Error::Config(
                    "socket path is required for unix network".to_string(),
                ));
            }
            _ => {}
        }
        if self.buffer_limit == 0 {
            return Err(Error::Config(
                "buffer limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Human readable address of the collector, used in logs and errors.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self.network {
            Network::Tcp => format!("tcp://{}:{}", self.host, self.port),
            Network::Unix => format!(
                "unix://{}",
                self.socket_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
        }
    }

    /// Wait before retry number `retry` (0-based), capped at `max_retry_wait`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.min(64)).unwrap_or(64);
        let wait = self.retry_wait.as_secs_f64() * BACKOFF_MULTIPLIER.powi(exponent);
        let cap = self.max_retry_wait.as_secs_f64();
        Duration::from_secs_f64(wait.min(cap))
    }

    /// Whether another retry is allowed after `retries` retries have been made.
    #[must_use]
    pub fn can_retry(&self, retries: u32) -> bool {
        self.max_retry.map_or(true, |max| retries < max)
    }
}
