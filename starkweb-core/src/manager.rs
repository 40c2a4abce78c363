//! # Configuration Manager
//!
//! [`create_config`] assembles the session: the chain, connector and session
//! stores, the connector registry and its event bridge, the client cache,
//! persistence, and provider discovery. The resulting [`Config`] is a cheap,
//! cloneable handle shared by every action.

use crate::{
    bridge::{ConnectorList, EventBridge},
    client::{Client, ClientCache, ClientSource},
    config::ConfigOptions,
    connector::{Connector, CreateConnectorFn},
    discovery::{self, ProviderDiscovery},
    error::{Error, Result},
    persist::{self, PersistHandle, PersistWorker, RECENT_CONNECTOR_KEY},
    registry::ConnectorRegistry,
    state::{PartializedState, State},
    storage::{KeyedStorage, Storage},
    store::{Store, SubscribeOptions, Subscription},
    types::{Chain, ChainId},
    version::current_version_tag,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Everything needed to build a [`Config`].
pub struct CreateConfigParameters {
    /// Must not be empty. The first chain is the default.
    pub chains: Vec<Chain>,
    pub connectors: Vec<CreateConnectorFn>,
    pub client: ClientSource,
    /// Persistent backend. `None` disables persistence.
    pub storage: Option<Arc<dyn Storage>>,
    pub discovery: Option<Arc<dyn ProviderDiscovery>>,
    pub options: ConfigOptions,
}

impl CreateConfigParameters {
    pub fn new(chains: Vec<Chain>, client: ClientSource) -> Self {
        Self {
            chains,
            connectors: Vec::new(),
            client,
            storage: None,
            discovery: None,
            options: ConfigOptions::default(),
        }
    }

    pub fn with_connectors(mut self, connectors: Vec<CreateConnectorFn>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn ProviderDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_options(mut self, options: ConfigOptions) -> Self {
        self.options = options;
        self
    }
}

/// The session handle.
#[derive(Clone)]
pub struct Config {
    inner: Arc<ConfigInner>,
}

/// A non-owning [`Config`] handle for background tasks.
#[derive(Clone)]
pub struct WeakConfig {
    inner: Weak<ConfigInner>,
}

impl WeakConfig {
    pub fn upgrade(&self) -> Option<Config> {
        self.inner.upgrade().map(|inner| Config { inner })
    }
}

struct ConfigInner {
    chains: Store<Vec<Chain>>,
    state: Store<State>,
    registry: ConnectorRegistry,
    clients: ClientCache,
    storage: Option<KeyedStorage>,
    persist: Option<PersistHandle>,
    discovery: Option<Arc<dyn ProviderDiscovery>>,
    options: ConfigOptions,
    version: u32,
    hydrated: Arc<AtomicBool>,
    subscriptions: Mutex<Vec<Subscription>>,
    /// Dropping this stops the discovery task.
    _discovery_shutdown: oneshot::Sender<()>,
}

/// Builds a [`Config`] and, unless `ssr` is set, restores the persisted session.
///
/// Must be called from within a Tokio runtime: persistence and discovery run
/// as background tasks.
pub async fn create_config(parameters: CreateConfigParameters) -> Result<Config> {
    let CreateConfigParameters {
        chains,
        connectors,
        client,
        storage,
        discovery,
        options,
    } = parameters;

    let Some(default_chain) = chains.first() else {
        return Err(Error::NoChainsConfigured);
    };
    let state = Store::new(State::initial(default_chain.chain_id.clone()));
    let chains = Store::new(chains);
    let connector_list: Store<ConnectorList> = Store::new(Vec::new());

    let storage = storage.map(|backend| KeyedStorage::new(backend, options.storage_key.clone()));
    let bridge = EventBridge::new(state.downgrade(), connector_list.downgrade());
    let registry = ConnectorRegistry::new(connector_list, chains.clone(), storage.clone(), bridge);

    let mut initial = Vec::with_capacity(connectors.len());
    for factory in &connectors {
        initial.push(registry.setup(factory)?);
    }
    let discovery = discovery.filter(|_| options.multi_injected_provider_discovery);
    if let Some(discovery) = discovery.as_ref().filter(|_| !options.ssr) {
        let mut seen: HashSet<String> = initial.iter().map(|c| c.id().to_string()).collect();
        for detail in discovery.providers() {
            if !seen.insert(detail.info.rdns.clone()) {
                continue;
            }
            match registry.setup(&detail.connector()) {
                Ok(connector) => initial.push(connector),
                Err(e) => warn!(rdns = %detail.info.rdns, error = %e, "failed to set up discovered provider"),
            }
        }
    }
    registry.set_state(initial);

    let version = current_version_tag();
    let persist = storage.as_ref().map(|storage| {
        let (worker, handle) = PersistWorker::new(storage.clone(), version);
        tokio::spawn(worker.run());
        handle
    });

    let hydrated = Arc::new(AtomicBool::new(storage.is_none() && !options.ssr));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let inner = Arc::new(ConfigInner {
        chains,
        state,
        registry,
        clients: ClientCache::new(client),
        storage,
        persist,
        discovery,
        options,
        version,
        hydrated,
        subscriptions: Mutex::new(Vec::new()),
        _discovery_shutdown: shutdown_tx,
    });
    let config = Config { inner };
    config.wire_listeners();

    if let Some(discovery) = &config.inner.discovery {
        tokio::spawn(discovery::run(config.downgrade(), discovery.subscribe(), shutdown_rx));
    }

    if !config.inner.options.ssr {
        config.hydrate().await?;
    }

    info!(
        chains = config.chains().len(),
        connectors = config.connectors().len(),
        version,
        "config created"
    );
    Ok(config)
}

impl Config {
    fn wire_listeners(&self) {
        let inner = &self.inner;
        let mut subscriptions = Vec::new();

        if let Some(persist) = inner.persist.clone() {
            let hydrated = inner.hydrated.clone();
            subscriptions.push(inner.state.subscribe(move |next, _| {
                if hydrated.load(Ordering::SeqCst) {
                    persist.write(PartializedState::from(next.as_ref()));
                }
            }));
        }

        if inner.options.sync_connected_chain {
            let chains = inner.chains.downgrade();
            let state = inner.state.downgrade();
            subscriptions.push(inner.state.subscribe_with_selector(
                |x: &State| x.current_connection().map(|c| c.chain_id.clone()),
                move |chain_id, _| {
                    let Some(chain_id) = chain_id else {
                        return;
                    };
                    let (Some(chains), Some(state)) = (chains.upgrade(), state.upgrade()) else {
                        return;
                    };
                    if !chains.get_state().iter().any(|c| &c.chain_id == chain_id) {
                        debug!(%chain_id, "connected chain is not configured, not following");
                        return;
                    }
                    state.update(|x| {
                        if &x.chain_id == chain_id {
                            return x.clone();
                        }
                        Arc::new(State {
                            chain_id: chain_id.clone(),
                            ..(**x).clone()
                        })
                    });
                },
                SubscribeOptions::default(),
            ));
        }

        let weak = self.downgrade();
        subscriptions.push(inner.chains.subscribe(move |_, _| {
            if let Some(config) = weak.upgrade() {
                config.inner.clients.clear();
                debug!("chains replaced, client cache cleared");
            }
        }));

        inner.subscriptions.lock().extend(subscriptions);
    }

    pub fn downgrade(&self) -> WeakConfig {
        WeakConfig {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn chains(&self) -> Arc<Vec<Chain>> {
        self.inner.chains.get_state()
    }

    /// Replaces the chain list. An empty list is ignored.
    pub fn set_chains(&self, chains: Vec<Chain>) {
        if chains.is_empty() {
            warn!("ignoring empty chain list");
            return;
        }
        self.inner.chains.set_state(chains);
    }

    pub fn subscribe_chains<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Vec<Chain>>, &Arc<Vec<Chain>>) + Send + Sync + 'static,
    {
        self.inner.chains.subscribe(listener)
    }

    pub fn connectors(&self) -> Arc<ConnectorList> {
        self.inner.registry.get_state()
    }

    pub fn set_connectors(&self, connectors: ConnectorList) {
        self.inner.registry.set_state(connectors);
    }

    /// Instantiates a connector without adding it to the sequence.
    pub fn setup_connector(&self, factory: &CreateConnectorFn) -> Result<Arc<Connector>> {
        self.inner.registry.setup(factory)
    }

    /// Instantiates a connector and appends it to the sequence.
    pub fn register_connector(&self, factory: &CreateConnectorFn) -> Result<Arc<Connector>> {
        self.inner.registry.register(factory)
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.inner.registry
    }

    pub(crate) fn bridge(&self) -> &EventBridge {
        self.inner.registry.bridge()
    }

    pub fn storage(&self) -> Option<&KeyedStorage> {
        self.inner.storage.as_ref()
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.inner.options
    }

    pub fn state(&self) -> Arc<State> {
        self.inner.state.get_state()
    }

    /// The disconnected snapshot for the current chain list.
    pub fn initial_state(&self) -> State {
        let chain_id = self
            .chains()
            .first()
            .map(|c| c.chain_id.clone())
            .unwrap_or_else(|| self.state().chain_id.clone());
        State::initial(chain_id)
    }

    /// Installs `next`. A snapshot whose `current` is not among its
    /// connections is replaced by the initial snapshot.
    pub fn set_state(&self, next: State) {
        let initial = self.initial_state();
        self.inner.state.set_state(guard(next, initial));
    }

    /// Installs an untyped snapshot, such as one read back from an external
    /// source. Anything that is not a complete snapshot installs the initial one.
    pub fn set_state_value(&self, value: Value) {
        match State::from_value(value) {
            Some(state) => self.set_state(state),
            None => {
                warn!("discarding incomplete state snapshot");
                self.set_state(self.initial_state());
            }
        }
    }

    /// Derives the next snapshot from the current one, with the same guard
    /// as [`set_state`](Self::set_state).
    pub fn update_state<F>(&self, f: F)
    where
        F: FnOnce(&State) -> State,
    {
        let initial = self.initial_state();
        self.inner
            .state
            .update(|current| Arc::new(guard(f(current.as_ref()), initial)));
    }

    /// Subscribes to a slice of the session snapshot.
    pub fn subscribe<U, S, F>(
        &self,
        selector: S,
        listener: F,
        options: SubscribeOptions<U>,
    ) -> Subscription
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        S: Fn(&State) -> U + Send + Sync + 'static,
        F: Fn(&U, &U) + Send + Sync + 'static,
    {
        self.inner
            .state
            .subscribe_with_selector(selector, listener, options)
    }

    /// The client for `chain_id`, or for the current chain.
    pub fn get_client(&self, chain_id: Option<&ChainId>) -> Result<Arc<Client>> {
        let current = self.state().chain_id.clone();
        self.inner
            .clients
            .get_client(chain_id, &current, &self.chains())
    }

    pub fn has_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::SeqCst)
    }

    /// Restores the persisted snapshot and enables persistence writes and
    /// discovery merges.
    pub async fn hydrate(&self) -> Result<()> {
        if let Some(storage) = &self.inner.storage {
            let initial = self.initial_state();
            let current = self.state();
            if let Some(restored) =
                persist::restore(storage, self.inner.version, &initial, &current).await?
            {
                debug!(connections = restored.connections.len(), "restoring persisted session");
                self.set_state(restored);
            }
        }
        self.inner.hydrated.store(true, Ordering::SeqCst);

        if let Some(discovery) = &self.inner.discovery {
            discovery::merge(self, &discovery.providers());
        }
        Ok(())
    }

    /// Waits until every queued snapshot write has reached storage.
    pub async fn flush(&self) {
        if let Some(persist) = &self.inner.persist {
            persist.flush().await;
        }
    }

    /// Id of the connector the user last connected with.
    pub async fn recent_connector_id(&self) -> Result<Option<String>> {
        let Some(storage) = &self.inner.storage else {
            return Ok(None);
        };
        storage
            .get::<String>(RECENT_CONNECTOR_KEY)
            .await
            .map_err(Error::Storage)
    }

    pub(crate) async fn set_recent_connector_id(&self, id: &str) -> Result<()> {
        let Some(storage) = &self.inner.storage else {
            return Ok(());
        };
        storage
            .set(RECENT_CONNECTOR_KEY, id)
            .await
            .map_err(Error::Storage)
    }
}

fn guard(next: State, initial: State) -> State {
    if next.is_well_formed() {
        next
    } else {
        warn!(current = ?next.current, "discarding snapshot whose current connection is missing");
        initial
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("chains", &self.chains().len())
            .field("connectors", &self.connectors().len())
            .field("status", &self.state().status)
            .finish()
    }
}
