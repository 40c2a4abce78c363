use serde::{Deserialize, Serialize};

/// Behavioral switches for a [`Config`](crate::Config).
///
/// Typically deserialized from a configuration file section and passed to
/// [`create_config`](crate::create_config) together with chains and connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigOptions {
    /// Defer hydration of persisted state until [`Config::hydrate`](crate::Config::hydrate)
    /// is called, and keep provider discovery idle until then.
    #[serde(default)]
    pub ssr: bool,
    /// Follow the active connection's chain in `state.chain_id`.
    #[serde(default = "default_true")]
    pub sync_connected_chain: bool,
    /// Register wallets announced through the discovery feed.
    #[serde(default = "default_true")]
    pub multi_injected_provider_discovery: bool,
    /// Prefix for every persisted key.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_true() -> bool {
    true
}

fn default_storage_key() -> String {
    "starkweb".to_string()
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            ssr: false,
            sync_connected_chain: true,
            multi_injected_provider_discovery: true,
            storage_key: default_storage_key(),
        }
    }
}
