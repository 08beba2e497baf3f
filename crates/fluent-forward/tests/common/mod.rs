// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loopback Fluentd collector for integration tests

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the collector answers ack requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum AckBehavior {
    Echo,
    Silent,
}

#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub tag: String,
    pub time: u64,
    pub record: HashMap<String, String>,
    pub chunk: Option<String>,
}

pub struct MockCollector {
    pub addr: SocketAddr,
    events: Arc<Mutex<Vec<ReceivedEvent>>>,
    connections: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockCollector {
    /// Starts a collector that optionally slams the first connection shut.
    pub async fn start(ack: AckBehavior, drop_first_connection: bool) -> MockCollector {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let events_clone = events.clone();
        let connections_clone = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = connections_clone.fetch_add(1, Ordering::SeqCst);
                if drop_first_connection && seen == 0 {
                    drop(socket);
                    continue;
                }
                tokio::spawn(serve(socket, ack, events_clone.clone()));
            }
        });

        MockCollector {
            addr,
            events,
            connections,
        }
    }

    pub fn events(&self) -> Vec<ReceivedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Polls until `count` events have arrived or the deadline passes.
    pub async fn wait_for(&self, count: usize) -> Vec<ReceivedEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(mut socket: TcpStream, ack: AckBehavior, events: Arc<Mutex<Vec<ReceivedEvent>>>) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        while let Some((event, used)) = decode_one(&pending) {
            pending.drain(..used);
            if let (Some(chunk), AckBehavior::Echo) = (event.chunk.as_deref(), ack) {
                let mut reply = Vec::new();
                rmp::encode::write_map_len(&mut reply, 1).unwrap();
                rmp::encode::write_str(&mut reply, "ack").unwrap();
                rmp::encode::write_str(&mut reply, chunk).unwrap();
                if socket.write_all(&reply).await.is_err() {
                    return;
                }
            }
            events.lock().unwrap().push(event);
        }
    }
}

type Message3 = (String, u64, HashMap<String, String>);
type Message4 = (String, u64, HashMap<String, String>, HashMap<String, String>);

/// Decodes one integer-time Message mode entry, returning it with the bytes consumed.
fn decode_one(buf: &[u8]) -> Option<(ReceivedEvent, usize)> {
    let mut cursor = Cursor::new(buf);
    let event = match buf.first()? {
        0x93 => {
            let (tag, time, record): Message3 = rmp_serde::from_read(&mut cursor).ok()?;
            ReceivedEvent {
                tag,
                time,
                record,
                chunk: None,
            }
        }
        0x94 => {
            let (tag, time, record, option): Message4 = rmp_serde::from_read(&mut cursor).ok()?;
            ReceivedEvent {
                tag,
                time,
                record,
                chunk: option.get("chunk").cloned(),
            }
        }
        _ => return None,
    };
    Some((event, usize::try_from(cursor.position()).ok()?))
}
