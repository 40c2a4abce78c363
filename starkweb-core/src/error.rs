use thiserror::Error;

/// Errors raised by a wallet provider while a connector talks to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("User rejected the request.")]
    UserRejectedRequest,

    #[error("Requested resource not available: {0}")]
    ResourceUnavailable(String),

    #[error("Provider returned no accounts.")]
    NoAccounts,

    #[error("Provider does not support `{0}`.")]
    Unsupported(String),

    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// The primary error type of the connector core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connector already connected.")]
    ConnectorAlreadyConnected,

    #[error("Chain not configured.")]
    ChainNotConfigured,

    #[error("No transport configured for chain {0}.")]
    TransportMissing(crate::types::ChainId),

    #[error("At least one chain must be configured.")]
    NoChainsConfigured,

    #[error("Failed to set up connector: {0}")]
    ConnectorSetup(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Storage operation failed: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
