// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Routes and the explicit adapter registry the host builds at startup.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::Dispatch;

use crate::error::AdapterError;
use crate::message::Message;
use crate::transport::AdapterTransports;

/// A parsed route URI such as `fluentd+tcp://collector:24224?k=v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Scheme, including any `+transport` suffix
    pub adapter: String,
    pub address: String,
    pub options: HashMap<String, String>,
}

impl Route {
    pub fn parse(uri: &str) -> Result<Route, AdapterError> {
        let invalid = |reason: &'static str| AdapterError::InvalidRoute {
            route: uri.to_string(),
            reason,
        };

        let (adapter, rest) = uri.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if adapter.is_empty() {
            return Err(invalid("missing scheme"));
        }

        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let address = location.split('/').next().unwrap_or_default();
        if address.is_empty() {
            return Err(invalid("missing address"));
        }

        let options = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (key.to_string(), value.to_string())
            })
            .collect();

        Ok(Route {
            adapter: adapter.to_string(),
            address: address.to_string(),
            options,
        })
    }

    /// Adapter name without the transport, `fluentd` for `fluentd+tcp`.
    #[must_use]
    pub fn adapter_type(&self) -> &str {
        self.adapter
            .split_once('+')
            .map_or(self.adapter.as_str(), |(adapter, _)| adapter)
    }

    /// Transport named after the `+`, or `default` when there is none.
    #[must_use]
    pub fn adapter_transport<'a>(&'a self, default: &'a str) -> &'a str {
        self.adapter
            .split_once('+')
            .map_or(default, |(_, transport)| transport)
    }
}

/// Consumes a stream of messages until the sender side is dropped.
#[async_trait]
pub trait LogAdapter: Send + Sync {
    async fn stream(&self, logstream: mpsc::Receiver<Message>);
}

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Everything a factory may need besides the route.
#[derive(Clone)]
pub struct FactoryContext {
    pub transports: AdapterTransports,
    /// Dispatcher the adapter logs through
    pub dispatch: Dispatch,
    env: EnvLookup,
}

impl FactoryContext {
    #[must_use]
    pub fn new(transports: AdapterTransports, dispatch: Dispatch) -> Self {
        FactoryContext {
            transports,
            dispatch,
            env: Arc::new(|key: &str| env::var(key).ok()),
        }
    }

    /// Replaces the process environment as the source of settings.
    #[must_use]
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn env(&self, key: &str) -> Option<String> {
        (self.env)(key)
    }
}

impl Default for FactoryContext {
    /// Default transports, logging to the current dispatcher.
    fn default() -> Self {
        FactoryContext::new(
            AdapterTransports::default(),
            tracing::dispatcher::get_default(Dispatch::clone),
        )
    }
}

impl std::fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryContext")
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn create(
        &self,
        route: &Route,
        ctx: &FactoryContext,
    ) -> Result<Box<dyn LogAdapter>, AdapterError>;
}

/// Adapter factories keyed by route scheme.
#[derive(Clone, Default)]
pub struct AdapterFactories {
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
}

impl AdapterFactories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: Arc<dyn AdapterFactory>) {
        self.factories.insert(name.to_string(), factory);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn AdapterFactory>> {
        self.factories.get(name).cloned()
    }

    /// Builds the adapter `route` names.
    pub async fn new_adapter(
        &self,
        route: &Route,
        ctx: &FactoryContext,
    ) -> Result<Box<dyn LogAdapter>, AdapterError> {
        let factory = self
            .lookup(route.adapter_type())
            .ok_or_else(|| AdapterError::AdapterNotFound(route.adapter_type().to_string()))?;
        factory.create(route, ctx).await
    }
}
