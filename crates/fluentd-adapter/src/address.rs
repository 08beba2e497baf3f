// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `host:port` splitting for route addresses.
//!
//! Accepts `host:port`, `:port` and bracketed IPv6 literals (`[::1]:24224`).

use std::borrow::Cow;
use std::num::ParseIntError;

/// Host used when an address leaves it out, as in `:24224`
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing port in address {0}")]
    MissingPort(String),

    #[error("too many colons in address {0}")]
    TooManyColons(String),

    #[error("missing ']' in address {0}")]
    MissingBracket(String),

    #[error("unexpected '{bracket}' in address {address}")]
    UnexpectedBracket { bracket: char, address: String },

    #[error("invalid port {port}: {source}")]
    InvalidPort {
        port: String,
        #[source]
        source: ParseIntError,
    },
}

/// `address` with an empty host replaced by [`DEFAULT_HOST`].
#[must_use]
pub fn with_default_host(address: &str) -> Cow<'_, str> {
    if address.starts_with(':') {
        Cow::Owned(format!("{DEFAULT_HOST}{address}"))
    } else {
        Cow::Borrowed(address)
    }
}

/// Splits `address` into its host and numeric port.
pub fn split_host_port(address: &str) -> Result<(String, u16), AddressError> {
    let missing_port = || AddressError::MissingPort(address.to_string());
    let too_many_colons = || AddressError::TooManyColons(address.to_string());

    let colon = address.rfind(':').ok_or_else(missing_port)?;

    // Byte offsets after which brackets may no longer appear
    let (host, open_from, close_from) = if let Some(rest) = address.strip_prefix('[') {
        let end = rest
            .find(']')
            .map(|i| i + 1)
            .ok_or_else(|| AddressError::MissingBracket(address.to_string()))?;
        if end + 1 == address.len() {
            return Err(missing_port());
        }
        if end + 1 != colon {
            return Err(if address.as_bytes()[end + 1] == b':' {
                too_many_colons()
            } else {
                missing_port()
            });
        }
        (&address[1..end], 1, end + 1)
    } else {
        let host = &address[..colon];
        if host.contains(':') {
            return Err(too_many_colons());
        }
        (host, 0, 0)
    };

    for (bracket, from) in [('[', open_from), (']', close_from)] {
        if address[from..].contains(bracket) {
            return Err(AddressError::UnexpectedBracket {
                bracket,
                address: address.to_string(),
            });
        }
    }

    let port = &address[colon + 1..];
    let port_num = port.parse::<u16>().map_err(|source| AddressError::InvalidPort {
        port: port.to_string(),
        source,
    })?;
    Ok((host.to_string(), port_num))
}
