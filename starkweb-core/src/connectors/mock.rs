//! A scripted connector for tests and demos.
//!
//! Behaves like a wallet that always holds the configured accounts. Failures
//! are injected through [`MockFeatures`].

use crate::{
    connector::{ConnectParams, ConnectResult, ConnectorContext, CreateConnectorFn, WalletConnector},
    error::{Error, ProviderError},
    types::{Address, Chain, ChainId},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MockFeatures {
    /// Returned from every `connect`.
    pub connect_error: Option<ProviderError>,
    /// Returned from `disconnect`.
    pub disconnect_error: Option<ProviderError>,
    /// Reports the wallet as authorized, enabling silent reconnect.
    pub reconnect: bool,
    /// Fails chain switches requested during `connect`.
    pub switch_chain_error: Option<ProviderError>,
}

#[derive(Debug, Clone)]
pub struct MockParameters {
    pub id: String,
    pub name: String,
    pub accounts: Vec<Address>,
    /// Chain the wallet starts on. Defaults to the first configured chain.
    pub chain_id: Option<ChainId>,
    pub features: MockFeatures,
}

impl MockParameters {
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            id: "mock".to_string(),
            name: "Mock Connector".to_string(),
            accounts,
            chain_id: None,
            features: MockFeatures::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_features(mut self, features: MockFeatures) -> Self {
        self.features = features;
        self
    }
}

pub fn mock(parameters: MockParameters) -> CreateConnectorFn {
    Arc::new(move |context: ConnectorContext| {
        let chain_id = parameters
            .chain_id
            .clone()
            .or_else(|| context.chains.first().map(|c| c.chain_id.clone()))
            .ok_or_else(|| Error::ConnectorSetup("mock connector needs a chain".into()))?;
        Ok(Box::new(MockConnector {
            parameters: parameters.clone(),
            chains: context.chains,
            session: Mutex::new(Session {
                connected: false,
                chain_id,
            }),
        }) as Box<dyn WalletConnector>)
    })
}

struct Session {
    connected: bool,
    chain_id: ChainId,
}

struct MockConnector {
    parameters: MockParameters,
    chains: Vec<Chain>,
    session: Mutex<Session>,
}

#[async_trait]
impl WalletConnector for MockConnector {
    fn id(&self) -> &str {
        &self.parameters.id
    }

    fn name(&self) -> &str {
        &self.parameters.name
    }

    fn kind(&self) -> &str {
        "mock"
    }

    async fn connect(&self, params: ConnectParams) -> Result<ConnectResult, ProviderError> {
        let features = &self.parameters.features;
        if let Some(e) = &features.connect_error {
            return Err(e.clone());
        }

        if let Some(target) = &params.chain_id {
            if let Some(e) = &features.switch_chain_error {
                return Err(e.clone());
            }
            if !self.chains.iter().any(|c| &c.chain_id == target) {
                return Err(ProviderError::ResourceUnavailable(format!(
                    "chain {target} is not supported"
                )));
            }
        }

        let mut session = self.session.lock();
        if let Some(target) = params.chain_id {
            session.chain_id = target;
        }
        session.connected = true;
        Ok(ConnectResult {
            accounts: self.parameters.accounts.clone(),
            chain_id: session.chain_id.clone(),
        })
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        if let Some(e) = &self.parameters.features.disconnect_error {
            return Err(e.clone());
        }
        self.session.lock().connected = false;
        Ok(())
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        if !self.session.lock().connected {
            return Err(ProviderError::NoAccounts);
        }
        Ok(self.parameters.accounts.clone())
    }

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        Ok(self.session.lock().chain_id.clone())
    }

    async fn is_authorized(&self) -> Result<bool, ProviderError> {
        Ok(self.parameters.features.reconnect && !self.parameters.accounts.is_empty())
    }
}
