// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The `fluentd` adapter.
//!
//! Each message is tagged `<prefix>.<suffix>`, where the suffix is the value
//! of the configured container label or, failing that, the container
//! hostname. Whitespace-only messages are dropped before they reach the
//! client. Delivery errors are logged and the loop moves on to the next
//! message; retrying is left to the client.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use fluent_forward::FluentClient;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn, Dispatch};

use crate::address::{split_host_port, with_default_host};
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::message::Message;
use crate::router::{AdapterFactories, AdapterFactory, FactoryContext, LogAdapter, Route};

pub const ADAPTER_NAME: &str = "fluentd";
pub const DEFAULT_TRANSPORT: &str = "tcp";

/// The record posted for every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Record<'a> {
    pub log: &'a str,
    pub container_id: &'a str,
    pub container_name: &'a str,
    pub source: &'a str,
}

impl<'a> Record<'a> {
    #[must_use]
    pub fn from_message(message: &'a Message) -> Self {
        Record {
            log: &message.data,
            container_id: &message.container.id,
            container_name: &message.container.name,
            source: &message.source,
        }
    }
}

/// Sink for tagged records.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn post_with_time(
        &self,
        tag: &str,
        time: SystemTime,
        record: &Record<'_>,
    ) -> Result<(), fluent_forward::Error>;

    async fn close(&self) {}
}

#[async_trait]
impl RecordWriter for FluentClient {
    async fn post_with_time(
        &self,
        tag: &str,
        time: SystemTime,
        record: &Record<'_>,
    ) -> Result<(), fluent_forward::Error> {
        FluentClient::post_with_time(self, tag, time, record).await
    }

    async fn close(&self) {
        FluentClient::close(self).await;
    }
}

/// Outcome of processing a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Skipped,
    Delivered,
    Failed,
}

/// Whether `data` consists only of ASCII whitespace, as `^[[:space:]]*$` would match.
#[must_use]
pub fn is_empty_message(data: &str) -> bool {
    data.bytes()
        .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
}

pub struct FluentdAdapter<W> {
    writer: W,
    tag_prefix: String,
    tag_suffix_label: String,
    dispatch: Dispatch,
}

impl<W: RecordWriter> FluentdAdapter<W> {
    pub fn new(writer: W, config: &AdapterConfig, dispatch: Dispatch) -> Self {
        FluentdAdapter {
            writer,
            tag_prefix: config.tag_prefix.clone(),
            tag_suffix_label: config.tag_suffix_label.clone(),
            dispatch,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[must_use]
    pub fn routing_tag(&self, message: &Message) -> String {
        let container_config = &message.container.config;
        let suffix = container_config
            .labels
            .get(&self.tag_suffix_label)
            .filter(|value| !value.is_empty())
            .unwrap_or(&container_config.hostname);
        format!("{}.{}", self.tag_prefix, suffix)
    }

    /// Filters, tags and posts one message.
    pub async fn process(&self, message: &Message) -> Delivery {
        if is_empty_message(&message.data) {
            info!(
                "FLUENTD | Skipping empty message from container {}",
                message.container.id
            );
            return Delivery::Skipped;
        }

        let tag = self.routing_tag(message);
        let record = Record::from_message(message);
        info!(
            "FLUENTD | {} {} {:?}",
            tag,
            message.time.to_rfc3339(),
            record
        );

        match self
            .writer
            .post_with_time(&tag, SystemTime::from(message.time), &record)
            .await
        {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                warn!("FLUENTD | Failed to post record with tag {}: {}", tag, e);
                Delivery::Failed
            }
        }
    }
}

#[async_trait]
impl<W: RecordWriter + 'static> LogAdapter for FluentdAdapter<W> {
    async fn stream(&self, mut logstream: mpsc::Receiver<Message>) {
        let dispatch = self.dispatch.clone();
        async move {
            while let Some(message) = logstream.recv().await {
                self.process(&message).await;
            }
            debug!("FLUENTD | Log stream closed, closing client");
            self.writer.close().await;
        }
        .with_subscriber(dispatch)
        .await;
    }
}

/// Builds [`FluentdAdapter`]s for `fluentd://` and `fluentd+<transport>://` routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FluentdFactory;

impl FluentdFactory {
    pub fn register(factories: &mut AdapterFactories) {
        factories.register(ADAPTER_NAME, Arc::new(FluentdFactory));
    }
}

#[async_trait]
impl AdapterFactory for FluentdFactory {
    async fn create(
        &self,
        route: &Route,
        ctx: &FactoryContext,
    ) -> Result<Box<dyn LogAdapter>, AdapterError> {
        new_adapter(route, ctx)
            .with_subscriber(ctx.dispatch.clone())
            .await
    }
}

async fn new_adapter(
    route: &Route,
    ctx: &FactoryContext,
) -> Result<Box<dyn LogAdapter>, AdapterError> {
    let transport_name = route.adapter_transport(DEFAULT_TRANSPORT);
    let transport =
        ctx.transports
            .lookup(transport_name)
            .ok_or_else(|| AdapterError::TransportNotFound {
                adapter: route.adapter.clone(),
                transport: transport_name.to_string(),
            })?;
    let address = with_default_host(&route.address);
    transport
        .dial(&address, &route.options)
        .await
        .map_err(|source| AdapterError::Dial {
            address: route.address.clone(),
            source,
        })?;
    info!(
        "FLUENTD | Connectivity successful to fluentd @ {}",
        route.address
    );

    let (host, port) =
        split_host_port(&address).map_err(|source| AdapterError::InvalidAddress {
            address: route.address.clone(),
            source,
        })?;

    let config = AdapterConfig::from_lookup(|key| ctx.env(key))?;
    let client = FluentClient::new(config.client_config(&host, port)).await?;
    debug!(
        "FLUENTD | Created adapter for {} with tag prefix {:?} and suffix label {:?}",
        client.config().endpoint(),
        config.tag_prefix,
        config.tag_suffix_label
    );

    Ok(Box::new(FluentdAdapter::new(
        client,
        &config,
        ctx.dispatch.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Container, ContainerConfig};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    struct Posted {
        tag: String,
        time: SystemTime,
        record: HashMap<String, String>,
    }

    #[derive(Default)]
    struct MockWriter {
        posted: Mutex<Vec<Posted>>,
        // Posts whose log equals this fail
        fail_log: Option<String>,
        closed: AtomicBool,
    }

    impl MockWriter {
        fn failing_on(log: &str) -> Self {
            MockWriter {
                fail_log: Some(log.to_string()),
                ..Default::default()
            }
        }

        fn posted(&self) -> Vec<Posted> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordWriter for MockWriter {
        async fn post_with_time(
            &self,
            tag: &str,
            time: SystemTime,
            record: &Record<'_>,
        ) -> Result<(), fluent_forward::Error> {
            let json = serde_json::to_value(record).unwrap();
            let record: HashMap<String, String> = serde_json::from_value(json).unwrap();
            let failed = self.fail_log.as_deref() == Some(record["log"].as_str());
            self.posted.lock().unwrap().push(Posted {
                tag: tag.to_string(),
                time,
                record,
            });
            if failed {
                return Err(fluent_forward::Error::BufferFull { limit: 1 });
            }
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn container(hostname: &str, labels: &[(&str, &str)]) -> Arc<Container> {
        Arc::new(Container {
            id: "abc123def456".to_string(),
            name: "/web".to_string(),
            config: ContainerConfig {
                hostname: hostname.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            },
        })
    }

    fn message(container: &Arc<Container>, data: &str) -> Message {
        Message {
            container: Arc::clone(container),
            source: "stdout".to_string(),
            data: data.to_string(),
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn adapter(writer: MockWriter, prefix: &str, label: &str) -> FluentdAdapter<MockWriter> {
        let config = AdapterConfig {
            tag_prefix: prefix.to_string(),
            tag_suffix_label: label.to_string(),
            ..Default::default()
        };
        FluentdAdapter::new(
            writer,
            &config,
            tracing::dispatcher::get_default(Dispatch::clone),
        )
    }

    #[test]
    fn test_tag_from_label() {
        let adapter = adapter(MockWriter::default(), "docker", "app");
        let c = container("abc123", &[("app", "web-1")]);
        assert_eq!(adapter.routing_tag(&message(&c, "x")), "docker.web-1");
    }

    #[test]
    fn test_tag_falls_back_to_hostname() {
        let adapter = adapter(MockWriter::default(), "docker", "app");

        let missing = container("abc123", &[]);
        assert_eq!(adapter.routing_tag(&message(&missing, "x")), "docker.abc123");

        let blank = container("abc123", &[("app", "")]);
        assert_eq!(adapter.routing_tag(&message(&blank, "x")), "docker.abc123");
    }

    #[test]
    fn test_tag_with_empty_prefix_keeps_separator() {
        let adapter = adapter(MockWriter::default(), "", "");
        let c = container("abc123", &[]);
        assert_eq!(adapter.routing_tag(&message(&c, "x")), ".abc123");
    }

    #[test]
    fn test_is_empty_message() {
        assert!(is_empty_message(""));
        assert!(is_empty_message(" \t\r\n\x0b\x0c"));
        assert!(!is_empty_message("  x  "));
        // Only ASCII whitespace counts
        assert!(!is_empty_message("\u{a0}"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_skips_empty_messages() {
        let adapter = adapter(MockWriter::default(), "docker", "");
        let c = container("abc123", &[]);

        assert_eq!(adapter.process(&message(&c, "")).await, Delivery::Skipped);
        assert_eq!(adapter.process(&message(&c, " \n\t")).await, Delivery::Skipped);
        assert!(adapter.writer().posted().is_empty());
        assert!(logs_contain("Skipping empty message"));
    }

    #[tokio::test]
    async fn test_record_is_verbatim() {
        let adapter = adapter(MockWriter::default(), "docker", "");
        let c = container("abc123", &[]);
        let mut msg = message(&c, "  padded line\n");
        msg.source = "stderr".to_string();

        assert_eq!(adapter.process(&msg).await, Delivery::Delivered);

        let posted = adapter.writer().posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].tag, "docker.abc123");
        assert_eq!(posted[0].time, SystemTime::from(msg.time));
        let expected = HashMap::from([
            ("log".to_string(), "  padded line\n".to_string()),
            ("container_id".to_string(), "abc123def456".to_string()),
            ("container_name".to_string(), "/web".to_string()),
            ("source".to_string(), "stderr".to_string()),
        ]);
        assert_eq!(posted[0].record, expected);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_does_not_stop_stream() {
        let adapter = adapter(MockWriter::failing_on("second"), "docker", "");
        let c = container("abc123", &[]);
        let (tx, rx) = mpsc::channel(8);

        for data in ["first", "second", "   ", "third"] {
            tx.send(message(&c, data)).await.unwrap();
        }
        drop(tx);
        adapter.stream(rx).await;

        let logs: Vec<String> = adapter
            .writer()
            .posted()
            .into_iter()
            .map(|p| p.record["log"].clone())
            .collect();
        assert_eq!(logs, vec!["first", "second", "third"]);
        assert!(adapter.writer().closed.load(Ordering::SeqCst));
        assert!(logs_contain("Failed to post record with tag docker.abc123"));
        // Every non-empty message is logged before it is posted
        assert!(logs_contain(
            "FLUENTD | docker.abc123 2024-05-01T12:00:00+00:00"
        ));
        assert!(logs_contain("log: \"third\""));
        assert!(logs_contain("Skipping empty message"));
    }

    #[tokio::test]
    async fn test_duplicate_messages_are_posted_twice() {
        let adapter = adapter(MockWriter::default(), "docker", "");
        let c = container("abc123", &[]);
        let msg = message(&c, "same line");

        assert_eq!(adapter.process(&msg).await, Delivery::Delivered);
        assert_eq!(adapter.process(&msg).await, Delivery::Delivered);

        let posted = adapter.writer().posted();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0], posted[1]);
    }

    proptest::proptest! {
        #[test]
        fn test_whitespace_only_is_empty(data in "[ \t\r\n\x0b\x0c]*") {
            proptest::prop_assert!(is_empty_message(&data));
        }

        #[test]
        fn test_visible_char_is_not_empty(
            before in "[ \t\n]*",
            visible in "[!-~]",
            after in "\\PC*",
        ) {
            let data = format!("{before}{visible}{after}");
            proptest::prop_assert!(!is_empty_message(&data));
        }

        #[test]
        fn test_tag_is_prefix_dot_suffix(
            prefix in "[a-z.]{0,12}",
            label in "[a-z]{1,8}",
            value in "[a-z0-9-]{0,12}",
            hostname in "[a-f0-9]{12}",
        ) {
            let adapter = adapter(MockWriter::default(), &prefix, &label);
            let c = container(&hostname, &[(label.as_str(), value.as_str())]);
            let suffix = if value.is_empty() { &hostname } else { &value };
            proptest::prop_assert_eq!(
                adapter.routing_tag(&message(&c, "x")),
                format!("{prefix}.{suffix}")
            );
        }
    }
}
