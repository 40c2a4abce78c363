//! A connector for wallets that expose a provider object in-process, either
//! configured up front or announced through provider discovery.

use crate::{
    connector::{ConnectParams, ConnectResult, ConnectorContext, CreateConnectorFn, WalletConnector},
    emitter::{ConnectorEvent, Emitter, EventKind},
    error::{Error, ProviderError},
    storage::KeyedStorage,
    types::{Address, ChainId},
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// A request sent to a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletRequest {
    /// `silent_mode` asks the wallet not to prompt the user.
    RequestAccounts { silent_mode: bool },
    RequestChainId,
    SwitchChain { chain_id: ChainId },
}

impl WalletRequest {
    pub fn method(&self) -> &'static str {
        match self {
            WalletRequest::RequestAccounts { .. } => "wallet_requestAccounts",
            WalletRequest::RequestChainId => "wallet_requestChainId",
            WalletRequest::SwitchChain { .. } => "wallet_switchStarknetChain",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            WalletRequest::RequestAccounts { silent_mode } => json!({ "silent_mode": silent_mode }),
            WalletRequest::RequestChainId => Value::Null,
            WalletRequest::SwitchChain { chain_id } => json!({ "chainId": chain_id }),
        }
    }
}

/// A notification pushed by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    NetworkChanged {
        chain_id: Option<ChainId>,
        accounts: Option<Vec<Address>>,
    },
    Disconnected,
}

/// The provider object a wallet exposes.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    async fn request(&self, request: WalletRequest) -> Result<Value, ProviderError>;

    /// Push notifications from the wallet, if it has any.
    fn events(&self) -> Option<BoxStream<'static, WalletEvent>> {
        None
    }
}

/// Identifies the wallet behind an injected provider.
#[derive(Clone)]
pub struct InjectedTarget {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub provider: Arc<dyn InjectedProvider>,
}

/// Builds an injected connector for `target`.
pub fn injected(target: InjectedTarget) -> CreateConnectorFn {
    Arc::new(move |context: ConnectorContext| {
        if target.id.is_empty() {
            return Err(Error::ConnectorSetup("injected target needs an id".into()));
        }
        Ok(Box::new(InjectedConnector {
            target: target.clone(),
            emitter: context.emitter,
            storage: context.storage,
        }) as Box<dyn WalletConnector>)
    })
}

struct InjectedConnector {
    target: InjectedTarget,
    emitter: Arc<Emitter>,
    storage: Option<KeyedStorage>,
}

impl InjectedConnector {
    /// Marks that the user disconnected on purpose, which suppresses silent reconnects.
    fn disconnected_key(&self) -> String {
        format!("{}.disconnected", self.target.id)
    }

    async fn request_accounts(&self, silent_mode: bool) -> Result<Vec<Address>, ProviderError> {
        let value = self
            .target
            .provider
            .request(WalletRequest::RequestAccounts { silent_mode })
            .await?;
        parse_accounts(value)
    }

    async fn request_chain_id(&self) -> Result<ChainId, ProviderError> {
        let value = self
            .target
            .provider
            .request(WalletRequest::RequestChainId)
            .await?;
        parse_chain_id(value)
    }
}

#[async_trait]
impl WalletConnector for InjectedConnector {
    fn id(&self) -> &str {
        &self.target.id
    }

    fn name(&self) -> &str {
        &self.target.name
    }

    fn kind(&self) -> &str {
        "injected"
    }

    fn setup(&self) -> Result<(), ProviderError> {
        let Some(events) = self.target.provider.events() else {
            return Ok(());
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(connector = %self.target.id, "no async runtime, provider events are not forwarded");
            return Ok(());
        };
        runtime.spawn(forward_events(
            events,
            Arc::downgrade(&self.emitter),
            self.target.provider.clone(),
        ));
        Ok(())
    }

    async fn connect(&self, params: ConnectParams) -> Result<ConnectResult, ProviderError> {
        let accounts = self.request_accounts(params.is_reconnecting).await?;
        if accounts.is_empty() {
            return Err(ProviderError::NoAccounts);
        }

        let mut chain_id = self.request_chain_id().await?;
        if let Some(target) = params.chain_id {
            if target != chain_id {
                self.target
                    .provider
                    .request(WalletRequest::SwitchChain {
                        chain_id: target.clone(),
                    })
                    .await?;
                chain_id = target;
            }
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&self.disconnected_key()).await {
                warn!(connector = %self.target.id, error = %e, "failed to clear disconnect marker");
            }
        }

        Ok(ConnectResult { accounts, chain_id })
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        if let Some(storage) = &self.storage {
            storage
                .set(&self.disconnected_key(), &true)
                .await
                .map_err(|e| ProviderError::ResourceUnavailable(e.to_string()))?;
        }
        Ok(())
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_accounts(true).await
    }

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        self.request_chain_id().await
    }

    async fn is_authorized(&self) -> Result<bool, ProviderError> {
        if let Some(storage) = &self.storage {
            let marked = storage
                .get::<bool>(&self.disconnected_key())
                .await
                .unwrap_or_default()
                .unwrap_or(false);
            if marked {
                return Ok(false);
            }
        }
        match self.request_accounts(true).await {
            Ok(accounts) => Ok(!accounts.is_empty()),
            Err(e) => {
                debug!(connector = %self.target.id, error = %e, "silent account request failed");
                Ok(false)
            }
        }
    }
}

/// Republishes wallet notifications as connector events until the wallet
/// stops sending or the connector is gone.
async fn forward_events(
    mut events: BoxStream<'static, WalletEvent>,
    emitter: Weak<Emitter>,
    provider: Arc<dyn InjectedProvider>,
) {
    while let Some(event) = events.next().await {
        let Some(emitter) = emitter.upgrade() else {
            break;
        };
        match event {
            WalletEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                emitter.emit(ConnectorEvent::Disconnect);
            }
            WalletEvent::AccountsChanged(accounts) => {
                // Waiting for `connect` means the wallet connected on its own.
                if emitter.listener_count(EventKind::Connect) > 0 {
                    match provider.request(WalletRequest::RequestChainId).await.and_then(parse_chain_id) {
                        Ok(chain_id) => emitter.emit(ConnectorEvent::Connect { accounts, chain_id }),
                        Err(e) => warn!(uid = %emitter.uid(), error = %e, "could not read chain for connect event"),
                    }
                } else {
                    emitter.emit(ConnectorEvent::Change {
                        accounts: Some(accounts),
                        chain_id: None,
                    });
                }
            }
            WalletEvent::NetworkChanged { chain_id, accounts } => {
                emitter.emit(ConnectorEvent::Change { accounts, chain_id });
            }
            WalletEvent::Disconnected => emitter.emit(ConnectorEvent::Disconnect),
        }
    }
    debug!("provider event stream closed");
}

fn parse_accounts(value: Value) -> Result<Vec<Address>, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Rpc {
        code: -32603,
        message: format!("malformed accounts: {e}"),
    })
}

fn parse_chain_id(value: Value) -> Result<ChainId, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Rpc {
        code: -32603,
        message: format!("malformed chain id: {e}"),
    })
}
