//! A headless session manager for Starknet wallet connections.
//!
//! The crate keeps one observable session snapshot consistent with the
//! lifecycle events published by any number of wallet connectors, persists the
//! durable part of it, and memoizes one RPC client per configured chain.
//!
//! # Key Components
//!
//! *   [`manager::create_config`]: Builds the [`Config`] handle every other API works on.
//! *   [`actions`]: `connect`, `disconnect`, `reconnect`, and the getters and watchers
//!     applications use to follow the session.
//! *   [`connector`]: The [`WalletConnector`](connector::WalletConnector) trait a wallet
//!     integration implements, and the live [`Connector`](connector::Connector) wrapper.
//! *   [`bridge`]: Routes connector events into session transitions.
//! *   [`discovery`]: Merges wallets announced at runtime into the connector list.
//! *   [`store`]: The reactive container behind every observable value.
pub mod actions;
pub mod bridge;
/// Per-chain RPC clients and their cache.
pub mod client;
/// Behavioral switches for a [`Config`].
pub mod config;
pub mod connector;
/// Built-in connectors.
pub mod connectors;
pub mod discovery;
pub mod emitter;
pub mod error;
pub mod manager;
/// The background snapshot writer and the hydration read path.
pub mod persist;
mod registry;
pub mod state;
/// A trait for persistent key-value backends, and the in-memory ones.
pub mod storage;
pub mod store;
pub mod types;
pub mod version;

pub use config::ConfigOptions;
pub use error::{Error, ProviderError, Result};
pub use manager::{create_config, Config, CreateConfigParameters, WeakConfig};
pub use registry::ConnectorRegistry;
pub use state::{Connection, State, Status};
pub use types::{Address, Chain, ChainId};
