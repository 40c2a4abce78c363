//! # Connectors
//!
//! A wallet integration implements [`WalletConnector`]. The registry wraps each
//! instance into a live [`Connector`] that owns an isolated [`Emitter`] and a
//! session-scoped `uid`, and tracks which bridge listeners are attached to it.

use crate::{
    emitter::{Emitter, EventKind, ListenerId},
    error::{Error, ProviderError},
    state::ConnectorInfo,
    storage::KeyedStorage,
    types::{Address, Chain, ChainId},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Parameters for a provider handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    /// The chain the caller wants to end up on, if any.
    pub chain_id: Option<ChainId>,
    /// Set by silent restore; connectors must not prompt the user.
    pub is_reconnecting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResult {
    pub accounts: Vec<Address>,
    pub chain_id: ChainId,
}

/// Everything a connector factory receives.
#[derive(Clone)]
pub struct ConnectorContext {
    pub emitter: Arc<Emitter>,
    pub chains: Vec<Chain>,
    pub storage: Option<KeyedStorage>,
}

/// The capability surface a wallet integration must provide.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Provider-scoped id, stable across sessions (e.g. an rdns name).
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// The connector family, e.g. `injected` or `mock`.
    fn kind(&self) -> &str;

    fn chain_id(&self) -> Option<ChainId> {
        None
    }

    /// Called once right after registration.
    fn setup(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn connect(&self, params: ConnectParams) -> Result<ConnectResult, ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;

    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError>;

    /// Whether a silent reconnect is expected to succeed.
    async fn is_authorized(&self) -> Result<bool, ProviderError> {
        Ok(false)
    }
}

/// Builds a wallet connector from the registry-provided context.
pub type CreateConnectorFn =
    Arc<dyn Fn(ConnectorContext) -> Result<Box<dyn WalletConnector>, Error> + Send + Sync>;

/// Wraps a closure into a [`CreateConnectorFn`].
pub fn create_connector<F>(factory: F) -> CreateConnectorFn
where
    F: Fn(ConnectorContext) -> Result<Box<dyn WalletConnector>, Error> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Which bridge listeners a connector currently carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No bridge listeners.
    Detached,
    /// Only `connect` is attached.
    AwaitingConnect,
    /// `change` and `disconnect` are attached.
    Connected,
    /// A disconnect is in flight; nothing is attached.
    Disconnecting,
}

pub(crate) struct Wiring {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) listeners: Vec<(EventKind, ListenerId)>,
}

/// A registered connector instance.
pub struct Connector {
    uid: String,
    emitter: Arc<Emitter>,
    inner: Box<dyn WalletConnector>,
    pub(crate) wiring: Mutex<Wiring>,
}

impl Connector {
    pub(crate) fn new(emitter: Arc<Emitter>, inner: Box<dyn WalletConnector>) -> Self {
        Self {
            uid: emitter.uid().to_string(),
            emitter,
            inner,
            wiring: Mutex::new(Wiring {
                lifecycle: Lifecycle::Detached,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn kind(&self) -> &str {
        self.inner.kind()
    }

    pub fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.wiring.lock().lifecycle
    }

    /// The identifying fields persisted with a connection.
    pub fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            chain_id: self.inner.chain_id(),
            id: self.id().to_string(),
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            uid: self.uid.clone(),
        }
    }

    pub(crate) fn setup(&self) -> Result<(), ProviderError> {
        self.inner.setup()
    }

    pub async fn connect(&self, params: ConnectParams) -> Result<ConnectResult, ProviderError> {
        self.inner.connect(params).await
    }

    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        self.inner.disconnect().await
    }

    pub async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.inner.get_accounts().await
    }

    pub async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        self.inner.get_chain_id().await
    }

    pub async fn is_authorized(&self) -> Result<bool, ProviderError> {
        self.inner.is_authorized().await
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("uid", &self.uid)
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
