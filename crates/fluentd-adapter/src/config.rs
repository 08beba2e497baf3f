// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use fluent_forward::{Config, Network};

pub const DEFAULT_TAG_PREFIX: &str = "docker";
pub const DEFAULT_BUFFER_LIMIT: usize = 1024 * 1024;
pub const DEFAULT_RETRY_WAIT_MS: u64 = 1000;
/// `FLUENTD_MAX_RETRIES` value meaning "retry forever"
pub const UNLIMITED_RETRIES: u32 = i32::MAX as u32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid integer for {key}: {source}")]
    Int {
        key: &'static str,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid boolean for {key}: {value:?}")]
    Bool { key: &'static str, value: String },
}

/// Adapter settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub tag_prefix: String,
    /// Container label whose value becomes the tag suffix
    pub tag_suffix_label: String,
    pub buffer_limit: usize,
    pub retry_wait: Duration,
    pub max_retries: Option<u32>,
    pub async_connect: bool,
    pub sub_second_precision: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            tag_suffix_label: String::new(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            retry_wait: Duration::from_millis(DEFAULT_RETRY_WAIT_MS),
            max_retries: None,
            async_connect: false,
            sub_second_precision: false,
        }
    }
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`. Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let defaults = AdapterConfig::default();

        let max_retries = match parse_int::<u32>(&get, "FLUENTD_MAX_RETRIES")? {
            None | Some(UNLIMITED_RETRIES) => None,
            Some(max) => Some(max),
        };

        Ok(AdapterConfig {
            tag_prefix: get("TAG_PREFIX").unwrap_or(defaults.tag_prefix),
            tag_suffix_label: get("TAG_SUFFIX_LABEL").unwrap_or(defaults.tag_suffix_label),
            buffer_limit: parse_int(&get, "FLUENTD_BUFFER_LIMIT")?
                .unwrap_or(defaults.buffer_limit),
            retry_wait: parse_int(&get, "FLUENTD_RETRY_WAIT")?
                .map_or(defaults.retry_wait, Duration::from_millis),
            max_retries,
            async_connect: parse_bool(&get, "FLUENTD_ASYNC_CONNECT")?
                .unwrap_or(defaults.async_connect),
            sub_second_precision: parse_bool(&get, "FLUENTD_SUBSECOND_PRECISION")?
                .unwrap_or(defaults.sub_second_precision),
        })
    }

    /// Client settings for a collector at `host:port`. Always tcp with acks.
    #[must_use]
    pub fn client_config(&self, host: &str, port: u16) -> Config {
        Config {
            host: host.to_string(),
            port,
            network: Network::Tcp,
            socket_path: None,
            buffer_limit: self.buffer_limit,
            retry_wait: self.retry_wait,
            max_retry: self.max_retries,
            async_connect: self.async_connect,
            sub_second_precision: self.sub_second_precision,
            request_ack: true,
            ..Default::default()
        }
    }
}

fn parse_int<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    get(key)
        .map(|value| value.parse::<T>())
        .transpose()
        .map_err(|source| ConfigError::Int { key, source })
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|value| match value.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ConfigError::Bool { key, value }),
        })
        .transpose()
}
