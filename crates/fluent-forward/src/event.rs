// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forward protocol encoding.
//!
//! Every event is written in Message mode, `[tag, time, record, option?]`. The
//! time is either integer seconds or, with sub-second precision, an
//! `EventTime` extension (type 0) carrying big-endian seconds and nanoseconds.
//! When acks are requested the option map carries a `chunk` id that the
//! collector echoes back as `{"ack": chunk}`.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::EncodeError;

const EVENT_TIME_EXT_TYPE: i8 = 0;
const EVENT_TIME_LEN: u32 = 8;

/// Nanosecond resolution timestamp of the Forward protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTime {
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl EventTime {
    pub fn from_system_time(time: SystemTime) -> Result<Self, EncodeError> {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| EncodeError::TimeBeforeEpoch)?;
        let seconds =
            u32::try_from(since_epoch.as_secs()).map_err(|_| EncodeError::TimeOutOfRange)?;
        Ok(EventTime {
            seconds,
            nanoseconds: since_epoch.subsec_nanos(),
        })
    }

    fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.seconds.to_be_bytes());
        bytes[4..].copy_from_slice(&self.nanoseconds.to_be_bytes());
        bytes
    }
}

/// An event ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    data: Vec<u8>,
    chunk: Option<String>,
}

impl EncodedEvent {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Chunk id the collector must acknowledge, if acks were requested.
    #[must_use]
    pub fn chunk(&self) -> Option<&str> {
        self.chunk.as_deref()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AckResponse {
    pub(crate) ack: String,
}

fn write_err<E: std::fmt::Display>(e: E) -> EncodeError {
    EncodeError::Write(e.to_string())
}

/// Encodes one event in Message mode.
///
/// Structs are serialized as maps so the collector sees field names as keys.
pub fn encode<T>(
    tag: &str,
    time: SystemTime,
    record: &T,
    sub_second_precision: bool,
    request_ack: bool,
) -> Result<EncodedEvent, EncodeError>
where
    T: Serialize + ?Sized,
{
    let chunk = request_ack.then(new_chunk_id);
    let mut data = Vec::with_capacity(128);

    let len = if chunk.is_some() { 4 } else { 3 };
    rmp::encode::write_array_len(&mut data, len).map_err(write_err)?;
    rmp::encode::write_str(&mut data, tag).map_err(write_err)?;

    if sub_second_precision {
        let event_time = EventTime::from_system_time(time)?;
        rmp::encode::write_ext_meta(&mut data, EVENT_TIME_LEN, EVENT_TIME_EXT_TYPE)
            .map_err(write_err)?;
        data.extend_from_slice(&event_time.to_bytes());
    } else {
        let seconds = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| EncodeError::TimeBeforeEpoch)?
            .as_secs();
        rmp::encode::write_uint(&mut data, seconds).map_err(write_err)?;
    }

    rmp_serde::encode::write_named(&mut data, record)?;

    if let Some(chunk) = chunk.as_deref() {
        rmp::encode::write_map_len(&mut data, 1).map_err(write_err)?;
        rmp::encode::write_str(&mut data, "chunk").map_err(write_err)?;
        rmp::encode::write_str(&mut data, chunk).map_err(write_err)?;
    }

    Ok(EncodedEvent { data, chunk })
}

/// Random, base64 encoded chunk id.
#[must_use]
pub fn new_chunk_id() -> String {
    base64::engine::general_purpose::STANDARD.encode(uuid::Uuid::new_v4().as_bytes())
}
