use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use starkweb_core::{Chain, ConfigOptions};
use starkweb_logger::LogConfig;

/// The top-level configuration for the playground binary.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PlaygroundConfig {
    /// Options handed to the session manager.
    #[serde(default)]
    pub core: ConfigOptions,
    #[serde(default)]
    pub playground: PlaygroundSpecificConfig,
}

/// Contains settings that are unique to the playground binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlaygroundSpecificConfig {
    pub db_path: String,
    #[serde(default = "default_chains")]
    pub chains: Vec<Chain>,
    #[serde(default = "default_wallets")]
    pub wallets: Vec<WalletConfig>,
    /// Client options table; values may be keyed by chain id.
    #[serde(default)]
    pub client: Value,
    /// Restore the previous run's connections before acting on the session.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default)]
    pub log: LogConfig,
}

/// A scripted wallet exposed by the playground.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct WalletConfig {
    pub id: String,
    pub name: String,
    pub accounts: Vec<String>,
    /// Allows silent reconnect on the next run.
    #[serde(default)]
    pub authorized: bool,
}

fn default_true() -> bool {
    true
}

fn default_chains() -> Vec<Chain> {
    vec![
        Chain::new("0x534e5f4d41494e", "Starknet Mainnet")
            .with_rpc_url("https://starknet-mainnet.public.blastapi.io"),
        Chain::new("0x534e5f5345504f4c4941", "Starknet Sepolia")
            .with_rpc_url("https://starknet-sepolia.public.blastapi.io"),
    ]
}

fn default_wallets() -> Vec<WalletConfig> {
    vec![
        WalletConfig {
            id: "argentX".to_string(),
            name: "Argent X".to_string(),
            accounts: vec!["0x0a11ce".to_string()],
            authorized: true,
        },
        WalletConfig {
            id: "braavos".to_string(),
            name: "Braavos".to_string(),
            accounts: vec!["0x0b0b".to_string()],
            authorized: true,
        },
    ]
}

impl Default for PlaygroundSpecificConfig {
    fn default() -> Self {
        Self {
            db_path: "./starkweb_playground.db".to_string(),
            chains: default_chains(),
            wallets: default_wallets(),
            client: Value::Null,
            auto_reconnect: true,
            log: LogConfig::default(),
        }
    }
}

/// Loads the playground configuration from a TOML file, with `STARKWEB__*`
/// environment variables taking precedence.
pub fn load_config(path: &str) -> Result<PlaygroundConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("STARKWEB").separator("__"));

    let settings: PlaygroundConfig = builder
        .build()
        .context(format!("Failed to build configuration from '{}'", path))?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(settings)
}
