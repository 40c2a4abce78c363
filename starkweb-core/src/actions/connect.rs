use crate::{
    connector::{ConnectParams, Connector, CreateConnectorFn, Lifecycle},
    emitter::ConnectorEvent,
    error::{Error, ProviderError, Result},
    manager::Config,
    state::{Connection, State, Status},
    types::{Address, ChainId},
};
use std::sync::Arc;
use tracing::{info, warn};

/// The connector to connect with: a registered instance, or a factory that is
/// registered on the spot.
#[derive(Clone)]
pub enum ConnectorTarget {
    Registered(Arc<Connector>),
    Factory(CreateConnectorFn),
}

impl From<Arc<Connector>> for ConnectorTarget {
    fn from(connector: Arc<Connector>) -> Self {
        ConnectorTarget::Registered(connector)
    }
}

impl From<CreateConnectorFn> for ConnectorTarget {
    fn from(factory: CreateConnectorFn) -> Self {
        ConnectorTarget::Factory(factory)
    }
}

#[derive(Clone)]
pub struct ConnectParameters {
    pub connector: ConnectorTarget,
    /// The chain to end up on; the wallet is asked to switch if needed.
    pub chain_id: Option<ChainId>,
}

impl ConnectParameters {
    pub fn new(connector: impl Into<ConnectorTarget>) -> Self {
        Self {
            connector: connector.into(),
            chain_id: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReturnType {
    pub accounts: Vec<Address>,
    pub chain_id: ChainId,
}

/// Connects a wallet and makes it the current connection.
///
/// Fails with [`Error::ConnectorAlreadyConnected`] if the connector is already
/// current. On failure the status falls back to `connected` when another
/// connection is still current, otherwise to `disconnected`.
pub async fn connect(config: &Config, parameters: ConnectParameters) -> Result<ConnectReturnType> {
    let connector = match parameters.connector {
        ConnectorTarget::Registered(connector) => connector,
        ConnectorTarget::Factory(factory) => config.register_connector(&factory)?,
    };

    if config.state().current.as_deref() == Some(connector.uid()) {
        return Err(Error::ConnectorAlreadyConnected);
    }

    config.update_state(|x| State {
        status: Status::Connecting,
        ..x.clone()
    });
    connector.emitter().emit(ConnectorEvent::message("connecting"));

    match handshake(config, &connector, parameters.chain_id).await {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!(uid = %connector.uid(), connector = %connector.id(), error = %e, "connect failed");
            config.update_state(|x| State {
                status: if x.current.is_some() {
                    Status::Connected
                } else {
                    Status::Disconnected
                },
                ..x.clone()
            });
            Err(e)
        }
    }
}

async fn handshake(
    config: &Config,
    connector: &Arc<Connector>,
    chain_id: Option<ChainId>,
) -> Result<ConnectReturnType> {
    let data = connector
        .connect(ConnectParams {
            chain_id,
            is_reconnecting: false,
        })
        .await?;
    if data.accounts.is_empty() {
        return Err(ProviderError::NoAccounts.into());
    }

    config.set_recent_connector_id(connector.id()).await?;
    config.bridge().transition(connector, Lifecycle::Connected);

    let uid = connector.uid().to_string();
    let connection = Connection {
        accounts: data.accounts.clone(),
        chain_id: data.chain_id.clone(),
        connector: connector.info(),
    };
    config.update_state(|x| State {
        connections: x.connections.with(&uid, connection),
        current: Some(uid.clone()),
        status: Status::Connected,
        chain_id: x.chain_id.clone(),
    });

    info!(%uid, connector = %connector.id(), chain_id = %data.chain_id, "connected");
    Ok(ConnectReturnType {
        accounts: data.accounts,
        chain_id: data.chain_id,
    })
}
