//! Scrape modules and the capabilities they export.
//!
//! A capability is an async function from a [`ParameterBag`] to a JSON value.
//! Capabilities are grouped into named [`ScrapeModule`]s, and every module
//! compiled into the binary is listed in a [`ModuleCatalog`]. The registry
//! decides which catalog modules actually get routes.

pub mod igstalk;
pub mod kimi;
pub mod nakanime;
pub mod params;
pub mod twitter;

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{Result, ScrapeError};

pub use params::ParameterBag;

#[async_trait]
pub trait Capability: Send + Sync {
    /// Exported name. Drives both the route path and the HTTP method.
    fn name(&self) -> &str;

    async fn invoke(&self, params: ParameterBag) -> Result<Value>;
}

type CapabilityFn = dyn Fn(ParameterBag) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// A capability backed by a closure.
pub struct FnCapability {
    name: String,
    func: Box<CapabilityFn>,
}

#[async_trait]
impl Capability for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: ParameterBag) -> Result<Value> {
        (self.func)(params).await
    }
}

pub fn capability_fn<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn Capability>
where
    F: Fn(ParameterBag) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnCapability {
        name: name.into(),
        func: Box::new(move |params| Box::pin(func(params))),
    })
}

#[derive(Clone)]
pub struct ScrapeModule {
    name: String,
    exports: Vec<Arc<dyn Capability>>,
}

impl ScrapeModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: Vec::new(),
        }
    }

    /// Adds a capability. Re-exporting a name replaces the earlier capability
    /// but keeps its position.
    pub fn export(mut self, capability: Arc<dyn Capability>) -> Self {
        match self.exports.iter_mut().find(|c| c.name() == capability.name()) {
            Some(slot) => *slot = capability,
            None => self.exports.push(capability),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exports(&self) -> &[Arc<dyn Capability>] {
        &self.exports
    }

    pub fn find(&self, function: &str) -> Option<&Arc<dyn Capability>> {
        self.exports.iter().find(|c| c.name() == function)
    }
}

/// Every module compiled into the binary, keyed by module name.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    modules: HashMap<String, ScrapeModule>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin(client: Client) -> Self {
        let mut catalog = Self::new();
        catalog.register(igstalk::module(client.clone()));
        catalog.register(kimi::module(client.clone()));
        catalog.register(nakanime::module(client.clone()));
        catalog.register(twitter::module(client));
        catalog
    }

    pub fn register(&mut self, module: ScrapeModule) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn get(&self, name: &str) -> Option<&ScrapeModule> {
        self.modules.get(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

pub fn http_client(config: &UpstreamConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| ScrapeError::Network(format!("Failed to create HTTP client: {}", e)))?;
    Ok(client)
}

/// Sends a request and decodes a JSON body. Non-2xx answers fail with the
/// upstream status.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(ScrapeError::from)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::UpstreamStatus(status.as_u16()).into());
    }

    let body = response.json::<Value>().await.map_err(ScrapeError::from)?;
    debug!("Upstream answered {} with JSON body", status);
    Ok(body)
}
