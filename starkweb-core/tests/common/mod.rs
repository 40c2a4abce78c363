#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use starkweb_core::{
    client::{ClientSource, Transport},
    connector::CreateConnectorFn,
    connectors::{mock, InjectedProvider, MockFeatures, MockParameters, WalletEvent, WalletRequest},
    discovery::{ProviderDetail, ProviderInfo},
    error::ProviderError,
    storage::Storage,
    Address, Chain, ChainId, Config, ConfigOptions, CreateConfigParameters,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const MAINNET: &str = "0x534e5f4d41494e";
pub const SEPOLIA: &str = "0x534e5f5345504f4c4941";

pub fn chains() -> Vec<Chain> {
    vec![
        Chain::new(MAINNET, "Starknet Mainnet"),
        Chain::new(SEPOLIA, "Starknet Sepolia"),
    ]
}

pub fn addr(value: &str) -> Address {
    Address::new(value)
}

/// Answers every request with the method name and chain it was sent to.
pub struct EchoTransport {
    pub chain_id: ChainId,
}

#[async_trait]
impl Transport for EchoTransport {
    fn kind(&self) -> &str {
        "echo"
    }

    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        Ok(json!({ "chain": self.chain_id, "method": method, "params": params }))
    }
}

pub fn transports(chains: &[Chain]) -> ClientSource {
    let transports = chains
        .iter()
        .map(|c| {
            let transport: Arc<dyn Transport> = Arc::new(EchoTransport {
                chain_id: c.chain_id.clone(),
            });
            (c.chain_id.clone(), transport)
        })
        .collect::<HashMap<_, _>>();
    ClientSource::Transports {
        transports,
        options: Default::default(),
    }
}

pub fn mock_wallet(id: &str, account: &str) -> CreateConnectorFn {
    mock(MockParameters::new(vec![addr(account)]).with_id(id))
}

pub fn mock_wallet_with(id: &str, account: &str, features: MockFeatures) -> CreateConnectorFn {
    mock(
        MockParameters::new(vec![addr(account)])
            .with_id(id)
            .with_features(features),
    )
}

/// Builds configs the way most tests need them.
pub struct TestHarness {
    pub connectors: Vec<CreateConnectorFn>,
    pub storage: Option<Arc<dyn Storage>>,
    pub options: ConfigOptions,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            connectors: vec![
                mock_wallet("argentX", "0xa11ce"),
                mock_wallet("braavos", "0xb0b"),
            ],
            storage: None,
            options: ConfigOptions::default(),
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_connectors(mut self, connectors: Vec<CreateConnectorFn>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn parameters(&self) -> CreateConfigParameters {
        let chains = chains();
        let mut parameters = CreateConfigParameters::new(chains.clone(), transports(&chains))
            .with_connectors(self.connectors.clone())
            .with_options(self.options.clone());
        if let Some(storage) = &self.storage {
            parameters = parameters.with_storage(storage.clone());
        }
        parameters
    }

    pub async fn build(&self) -> Config {
        starkweb_core::create_config(self.parameters())
            .await
            .expect("config should build")
    }
}

/// An in-process wallet whose events are pushed by the test.
pub struct TestProvider {
    pub accounts: Mutex<Vec<Address>>,
    pub chain_id: Mutex<ChainId>,
    events: Mutex<Option<mpsc::UnboundedReceiver<WalletEvent>>>,
}

impl TestProvider {
    pub fn new(account: &str) -> (Arc<Self>, mpsc::UnboundedSender<WalletEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            accounts: Mutex::new(vec![addr(account)]),
            chain_id: Mutex::new(ChainId::new(MAINNET)),
            events: Mutex::new(Some(events_rx)),
        });
        (provider, events_tx)
    }
}

#[async_trait]
impl InjectedProvider for TestProvider {
    async fn request(&self, request: WalletRequest) -> Result<Value, ProviderError> {
        match request {
            WalletRequest::RequestAccounts { .. } => Ok(json!(*self.accounts.lock())),
            WalletRequest::RequestChainId => Ok(json!(*self.chain_id.lock())),
            WalletRequest::SwitchChain { chain_id } => {
                *self.chain_id.lock() = chain_id;
                Ok(Value::Bool(true))
            }
        }
    }

    fn events(&self) -> Option<BoxStream<'static, WalletEvent>> {
        self.events
            .lock()
            .take()
            .map(|rx| UnboundedReceiverStream::new(rx).boxed())
    }
}

pub fn detail(rdns: &str, provider: Arc<dyn InjectedProvider>) -> ProviderDetail {
    ProviderDetail {
        info: ProviderInfo {
            uuid: format!("uuid-{rdns}"),
            name: rdns.to_string(),
            icon: "data:image/svg+xml,<svg/>".to_string(),
            rdns: rdns.to_string(),
        },
        provider,
    }
}

/// Polls `condition` until it holds or a second has passed.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
