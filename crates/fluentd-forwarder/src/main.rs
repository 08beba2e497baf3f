// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Dispatch};
use tracing_subscriber::EnvFilter;

use fluentd_adapter::{
    AdapterFactories, AdapterTransports, FactoryContext, FluentdFactory, Message, Route,
};

const ROUTE_ENV: &str = "ROUTE";
const MESSAGE_CHANNEL_SIZE: usize = 1000;

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = EnvFilter::try_new(&log_level).unwrap_or_else(|e| {
        eprintln!("Invalid LOG_LEVEL {log_level:?}, falling back to info: {e}");
        EnvFilter::new("info")
    });
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();
    let dispatch = Dispatch::new(subscriber);
    if let Err(e) = tracing::dispatcher::set_global_default(dispatch.clone()) {
        eprintln!("Setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let Some(uri) = env::args().nth(1).or_else(|| env::var(ROUTE_ENV).ok()) else {
        error!("No route given. Pass fluentd://host:port as the first argument or set {ROUTE_ENV}");
        return ExitCode::FAILURE;
    };
    let route = match Route::parse(&uri) {
        Ok(route) => route,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut factories = AdapterFactories::new();
    FluentdFactory::register(&mut factories);
    let ctx = FactoryContext::new(AdapterTransports::default(), dispatch);

    let adapter = match factories.new_adapter(&route, &ctx).await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Unable to create {} adapter: {}", route.adapter, e);
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_SIZE);
    let stream = tokio::spawn(async move { adapter.stream(rx).await });
    info!("Forwarding stdin to {}", route.address);

    let forwarded = read_messages(tokio::io::stdin(), tx).await;

    if let Err(e) = stream.await {
        error!("Adapter task failed: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Input closed after {} messages, shutting down", forwarded);
    ExitCode::SUCCESS
}

/// Feeds JSON messages, one per line, into `tx` until `input` ends.
/// Returns the number of messages sent.
async fn read_messages<R>(input: R, tx: mpsc::Sender<Message>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut line_number = 0usize;
    let mut sent = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Message>(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    warn!("Adapter stopped consuming, dropping remaining input");
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!("Skipping invalid message on line {}: {}", line_number, e),
        }
    }
    sent
}
