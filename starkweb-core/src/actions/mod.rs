//! High-level operations on a [`Config`](crate::Config).

pub mod connect;
pub mod disconnect;
pub mod reconnect;
pub mod watch;

pub use connect::{connect, ConnectParameters, ConnectReturnType, ConnectorTarget};
pub use disconnect::disconnect;
pub use reconnect::reconnect;
pub use watch::{
    get_account, get_chains, get_connections, get_connectors, watch_account, watch_chains,
    watch_connections, watch_connectors, Account,
};
