// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Acknowledging Fluentd collector on a loopback port

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub tag: String,
    pub time: u64,
    pub record: HashMap<String, String>,
}

pub struct MockCollector {
    pub addr: SocketAddr,
    events: Arc<Mutex<Vec<ReceivedEvent>>>,
}

impl MockCollector {
    pub async fn start() -> MockCollector {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));

        let events_clone = events.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, events_clone.clone()));
            }
        });

        MockCollector { addr, events }
    }

    #[allow(dead_code)]
    pub async fn wait_for(&self, count: usize) -> Vec<ReceivedEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events.lock().unwrap().clone();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

type AckedMessage = (String, u64, HashMap<String, String>, HashMap<String, String>);

async fn serve(mut socket: TcpStream, events: Arc<Mutex<Vec<ReceivedEvent>>>) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        loop {
            let mut cursor = Cursor::new(pending.as_slice());
            let Ok((tag, time, record, option)) =
                rmp_serde::from_read::<_, AckedMessage>(&mut cursor)
            else {
                break;
            };
            let used = usize::try_from(cursor.position()).unwrap();
            pending.drain(..used);

            if let Some(chunk) = option.get("chunk") {
                let mut reply = Vec::new();
                rmp::encode::write_map_len(&mut reply, 1).unwrap();
                rmp::encode::write_str(&mut reply, "ack").unwrap();
                rmp::encode::write_str(&mut reply, chunk).unwrap();
                if socket.write_all(&reply).await.is_err() {
                    return;
                }
            }
            events
                .lock()
                .unwrap()
                .push(ReceivedEvent { tag, time, record });
        }
    }
}
