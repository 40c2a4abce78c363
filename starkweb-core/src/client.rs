//! # Chain Clients
//!
//! One logical client per configured chain, built on first use and memoized for
//! the lifetime of the chain list. The RPC transport behind a client is an
//! external collaborator; only its [`Transport`] interface is defined here.

use crate::{
    error::{Error, Result},
    types::{uid, Chain, ChainId},
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_POLLING_INTERVAL_MS: u64 = 4_000;

/// The JSON-RPC transport a client sends requests through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A short name for diagnostics, e.g. `http`.
    fn kind(&self) -> &str;

    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value>;
}

/// A client option that is either the same for every chain or set per chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainValue<T> {
    Uniform(T),
    PerChain(HashMap<ChainId, T>),
}

impl<T: Clone> ChainValue<T> {
    /// The value that applies to `chain_id`. A per-chain value without an
    /// entry for the chain resolves to nothing.
    pub fn resolve(&self, chain_id: &ChainId) -> Option<T> {
        match self {
            ChainValue::Uniform(value) => Some(value.clone()),
            ChainValue::PerChain(values) => values.get(chain_id).cloned(),
        }
    }
}

impl<T: DeserializeOwned> ChainValue<T> {
    /// Classifies an untyped option value against the configured chain ids.
    ///
    /// An object with at least one key equal to a configured chain id is a
    /// per-chain mapping (unknown keys are dropped); anything else, including
    /// objects whose keys match no chain, is a uniform value.
    pub fn classify(value: Value, chain_ids: &[ChainId]) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &value {
            let keyed_by_chain = chain_ids.iter().any(|id| map.contains_key(id.as_str()));
            if keyed_by_chain {
                let mut values = HashMap::new();
                for id in chain_ids {
                    if let Some(entry) = map.get(id.as_str()) {
                        values.insert(id.clone(), serde_json::from_value(entry.clone())?);
                    }
                }
                return Ok(ChainValue::PerChain(values));
            }
        }
        Ok(ChainValue::Uniform(serde_json::from_value(value)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchOptions {
    pub multicall: bool,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            multicall: true,
            batch_size: None,
        }
    }
}

/// Options applied to every client built from transports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOptions {
    pub batch: Option<ChainValue<BatchOptions>>,
    /// Milliseconds.
    pub cache_time: Option<ChainValue<u64>>,
    /// Milliseconds.
    pub polling_interval: Option<ChainValue<u64>>,
}

impl ClientOptions {
    /// Builds options from an untyped table such as a config file section.
    pub fn from_value(value: &Value, chain_ids: &[ChainId]) -> Result<Self, serde_json::Error> {
        fn field<T: DeserializeOwned>(
            value: &Value,
            key: &str,
            chain_ids: &[ChainId],
        ) -> Result<Option<ChainValue<T>>, serde_json::Error> {
            value
                .get(key)
                .map(|raw| ChainValue::classify(raw.clone(), chain_ids))
                .transpose()
        }

        Ok(Self {
            batch: field(value, "batch", chain_ids)?,
            cache_time: field(value, "cache-time", chain_ids)?,
            polling_interval: field(value, "polling-interval", chain_ids)?,
        })
    }
}

/// A client bound to one chain.
#[derive(Clone)]
pub struct Client {
    pub uid: String,
    pub chain: Chain,
    pub transport: Arc<dyn Transport>,
    pub batch: BatchOptions,
    pub cache_time: Duration,
    pub polling_interval: Duration,
}

impl Client {
    pub fn new(chain: Chain, transport: Arc<dyn Transport>) -> Self {
        let polling = Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS);
        Self {
            uid: uid(),
            chain,
            transport,
            batch: BatchOptions::default(),
            cache_time: polling,
            polling_interval: polling,
        }
    }

    pub async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.transport.request(method, params).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("uid", &self.uid)
            .field("chain_id", &self.chain.chain_id)
            .field("transport", &self.transport.kind())
            .finish()
    }
}

pub type ClientFactory = Arc<dyn Fn(&Chain) -> Client + Send + Sync>;

/// How clients are built.
#[derive(Clone)]
pub enum ClientSource {
    /// One transport per chain plus shared options.
    Transports {
        transports: HashMap<ChainId, Arc<dyn Transport>>,
        options: ClientOptions,
    },
    /// Caller-supplied construction.
    Factory(ClientFactory),
}

/// Memoizes clients by chain id.
pub struct ClientCache {
    clients: DashMap<ChainId, Arc<Client>>,
    source: ClientSource,
}

impl ClientCache {
    pub fn new(source: ClientSource) -> Self {
        Self {
            clients: DashMap::new(),
            source,
        }
    }

    /// Resolves the client for `requested`, or for `current` when no chain is requested.
    ///
    /// An unconfigured chain falls back to an already-built client: the one cached
    /// under the resolved id, or for an explicit request, the one under `current`.
    pub fn get_client(
        &self,
        requested: Option<&ChainId>,
        current: &ChainId,
        chains: &[Chain],
    ) -> Result<Arc<Client>> {
        let chain_id = requested.unwrap_or(current);
        let Some(chain) = chains.iter().find(|c| &c.chain_id == chain_id) else {
            if let Some(client) = self.clients.get(chain_id) {
                return Ok(client.value().clone());
            }
            if requested.is_some() {
                if let Some(client) = self.clients.get(current) {
                    debug!(requested = %chain_id, %current, "chain not configured, using current chain's client");
                    return Ok(client.value().clone());
                }
            }
            return Err(Error::ChainNotConfigured);
        };

        let client = self
            .clients
            .entry(chain_id.clone())
            .or_try_insert_with(|| self.build(chain).map(Arc::new))?;
        Ok(client.value().clone())
    }

    /// Drops every memoized client.
    pub fn clear(&self) {
        self.clients.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn build(&self, chain: &Chain) -> Result<Client> {
        debug!(chain_id = %chain.chain_id, "building chain client");
        match &self.source {
            ClientSource::Factory(factory) => Ok(factory(chain)),
            ClientSource::Transports {
                transports,
                options,
            } => {
                let transport = transports
                    .get(&chain.chain_id)
                    .cloned()
                    .ok_or_else(|| Error::TransportMissing(chain.chain_id.clone()))?;

                let mut client = Client::new(chain.clone(), transport);
                let id = &chain.chain_id;
                if let Some(batch) = options.batch.as_ref().and_then(|v| v.resolve(id)) {
                    client.batch = batch;
                }
                if let Some(ms) = options.polling_interval.as_ref().and_then(|v| v.resolve(id)) {
                    client.polling_interval = Duration::from_millis(ms);
                    client.cache_time = client.polling_interval;
                }
                if let Some(ms) = options.cache_time.as_ref().and_then(|v| v.resolve(id)) {
                    client.cache_time = Duration::from_millis(ms);
                }
                Ok(client)
            }
        }
    }
}
