use crate::{
    bridge::{ConnectorList, EventBridge},
    connector::{Connector, ConnectorContext, CreateConnectorFn, Lifecycle},
    emitter::Emitter,
    error::Result,
    storage::KeyedStorage,
    store::{Store, Subscription},
    types::{uid, Chain},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Turns connector factories into live connectors and owns the observable
/// connector sequence.
#[derive(Clone)]
pub struct ConnectorRegistry {
    connectors: Store<ConnectorList>,
    chains: Store<Vec<Chain>>,
    storage: Option<KeyedStorage>,
    bridge: EventBridge,
}

impl ConnectorRegistry {
    pub(crate) fn new(
        connectors: Store<ConnectorList>,
        chains: Store<Vec<Chain>>,
        storage: Option<KeyedStorage>,
        bridge: EventBridge,
    ) -> Self {
        Self {
            connectors,
            chains,
            storage,
            bridge,
        }
    }

    /// Instantiates a connector with a fresh emitter and `uid` and wires the
    /// bridge's `connect` listener before returning it.
    ///
    /// The connector is not added to the sequence; see [`register`](Self::register).
    /// A failing factory leaves nothing behind.
    pub fn setup(&self, factory: &CreateConnectorFn) -> Result<Arc<Connector>> {
        let emitter = Arc::new(Emitter::new(uid()));
        let context = ConnectorContext {
            emitter: emitter.clone(),
            chains: self.chains.get_state().as_ref().clone(),
            storage: self.storage.clone(),
        };
        let inner = factory(context)?;
        let connector = Arc::new(Connector::new(emitter, inner));

        self.bridge.transition(&connector, Lifecycle::AwaitingConnect);
        if let Err(e) = connector.setup() {
            warn!(uid = %connector.uid(), connector = %connector.id(), error = %e, "connector setup failed");
        }

        info!(uid = %connector.uid(), connector = %connector.id(), kind = %connector.kind(), "connector registered");
        Ok(connector)
    }

    /// Sets up `factory` and appends the result to the sequence.
    pub fn register(&self, factory: &CreateConnectorFn) -> Result<Arc<Connector>> {
        let connector = self.setup(factory)?;
        self.append(vec![connector.clone()]);
        Ok(connector)
    }

    /// Appends connectors in a single replacement of the sequence.
    pub fn append(&self, connectors: Vec<Arc<Connector>>) {
        if connectors.is_empty() {
            return;
        }
        self.connectors.update(|current| {
            let mut next = current.as_ref().clone();
            next.extend(connectors);
            Arc::new(next)
        });
    }

    /// Appends the connectors whose id is not registered yet, in a single
    /// replacement of the sequence. The id check and the append happen under
    /// the same lock. Returns how many were added.
    pub fn append_new(&self, connectors: Vec<Arc<Connector>>) -> usize {
        if connectors.is_empty() {
            return 0;
        }
        let mut added = 0;
        self.connectors.update(|current| {
            let mut known: HashSet<String> =
                current.iter().map(|c| c.id().to_string()).collect();
            let mut next = current.as_ref().clone();
            for connector in connectors {
                if known.insert(connector.id().to_string()) {
                    next.push(connector);
                }
            }
            added = next.len() - current.len();
            if added == 0 {
                return current.clone();
            }
            Arc::new(next)
        });
        added
    }

    /// Replaces the whole sequence. Entries shared with the previous sequence
    /// keep their identity and their listeners.
    pub fn set_state(&self, connectors: ConnectorList) {
        self.connectors.set_state(connectors);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&ConnectorList) -> ConnectorList,
    {
        self.connectors.update(|current| Arc::new(f(current)));
    }

    pub fn get_state(&self) -> Arc<ConnectorList> {
        self.connectors.get_state()
    }

    pub fn find(&self, uid: &str) -> Option<Arc<Connector>> {
        self.get_state().iter().find(|c| c.uid() == uid).cloned()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Arc<Connector>> {
        self.get_state().iter().find(|c| c.id() == id).cloned()
    }

    /// Provider-scoped ids of every registered connector.
    pub fn ids(&self) -> HashSet<String> {
        self.get_state().iter().map(|c| c.id().to_string()).collect()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<ConnectorList>, &Arc<ConnectorList>) + Send + Sync + 'static,
    {
        self.connectors.subscribe(listener)
    }

    pub(crate) fn bridge(&self) -> &EventBridge {
        &self.bridge
    }
}
