//! Read-only getters and change watchers.

use crate::{
    bridge::ConnectorList,
    manager::Config,
    state::{Connection, ConnectorInfo, State, Status},
    store::{SubscribeOptions, Subscription},
    types::{Address, Chain, ChainId},
};
use std::sync::Arc;

/// The active account as seen by an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Option<Address>,
    pub addresses: Option<Vec<Address>>,
    pub chain_id: Option<ChainId>,
    /// `None` when the wallet is on a chain that is not configured.
    pub chain: Option<Chain>,
    pub connector: Option<ConnectorInfo>,
    pub status: Status,
}

impl Account {
    pub fn from_state(state: &State, chains: &[Chain]) -> Self {
        match state.current_connection() {
            Some(connection) => Self {
                address: connection.accounts.first().cloned(),
                addresses: Some(connection.accounts.clone()),
                chain_id: Some(connection.chain_id.clone()),
                chain: chains
                    .iter()
                    .find(|c| c.chain_id == connection.chain_id)
                    .cloned(),
                connector: Some(connection.connector.clone()),
                status: state.status,
            },
            None => Self {
                address: None,
                addresses: None,
                chain_id: None,
                chain: None,
                connector: None,
                status: state.status,
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == Status::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == Status::Connecting
    }

    pub fn is_reconnecting(&self) -> bool {
        self.status == Status::Reconnecting
    }

    pub fn is_disconnected(&self) -> bool {
        self.status == Status::Disconnected
    }
}

pub fn get_chains(config: &Config) -> Arc<Vec<Chain>> {
    config.chains()
}

pub fn get_connectors(config: &Config) -> Arc<ConnectorList> {
    config.connectors()
}

/// Live connections in insertion order.
pub fn get_connections(config: &Config) -> Vec<Connection> {
    config.state().connections.values().cloned().collect()
}

pub fn get_account(config: &Config) -> Account {
    Account::from_state(&config.state(), &config.chains())
}

pub fn watch_chains<F>(config: &Config, on_change: F) -> Subscription
where
    F: Fn(&Arc<Vec<Chain>>, &Arc<Vec<Chain>>) + Send + Sync + 'static,
{
    config.subscribe_chains(on_change)
}

pub fn watch_connectors<F>(config: &Config, on_change: F) -> Subscription
where
    F: Fn(&Arc<ConnectorList>, &Arc<ConnectorList>) + Send + Sync + 'static,
{
    config.registry().subscribe(on_change)
}

pub fn watch_connections<F>(config: &Config, on_change: F) -> Subscription
where
    F: Fn(&Vec<Connection>, &Vec<Connection>) + Send + Sync + 'static,
{
    config.subscribe(
        |state: &State| state.connections.values().cloned().collect::<Vec<_>>(),
        on_change,
        SubscribeOptions::default(),
    )
}

/// Fires when any field of [`Account`] changes.
pub fn watch_account<F>(config: &Config, on_change: F) -> Subscription
where
    F: Fn(&Account, &Account) + Send + Sync + 'static,
{
    let chains = config.downgrade();
    config.subscribe(
        move |state: &State| {
            let chains = chains.upgrade().map(|c| c.chains()).unwrap_or_default();
            Account::from_state(state, &chains)
        },
        on_change,
        SubscribeOptions::default(),
    )
}
