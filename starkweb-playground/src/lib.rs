pub mod cli;
pub mod config;
pub mod storage;
pub mod transport;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::{load_config, PlaygroundConfig, WalletConfig};
use serde_json::Value;
use starkweb_core::{
    actions::{connect, disconnect, get_account, reconnect, ConnectParameters},
    client::{ClientOptions, ClientSource, Transport},
    connector::CreateConnectorFn,
    connectors::{mock, MockFeatures, MockParameters},
    storage::Storage,
    Address, ChainId, Config, CreateConfigParameters,
};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use storage::SledStorage;
use transport::DemoTransport;

/// The main entry point for the playground binary.
/// This function handles CLI parsing, configuration, and command dispatch.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config_from_cli(cli.config.as_deref())?;
    starkweb_logger::init(&config.playground.log)?;
    tracing::debug!("Configuration loaded: {:#?}", &config);

    let storage = SledStorage::open(&config.playground.db_path)?;
    let session = build_session(&config, Arc::new(storage)).await?;
    if config.playground.auto_reconnect && needs_live_session(&cli.command) {
        reconnect(&session, None).await?;
    }

    let output = execute(&session, cli.command).await;
    session.flush().await;
    println!("{}", output?);
    Ok(())
}

/// Loads the playground configuration based on the provided CLI flag.
fn load_config_from_cli(path: Option<&str>) -> Result<PlaygroundConfig> {
    if let Some(config_path) = path {
        eprintln!("Loading configuration from '{}'", config_path);
        load_config(config_path)
    } else {
        Ok(PlaygroundConfig::default())
    }
}

fn needs_live_session(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Connect { .. } | Commands::Disconnect { .. } | Commands::Request { .. }
    )
}

/// Creates the session manager described by `config` on top of `storage`.
pub async fn build_session(config: &PlaygroundConfig, storage: Arc<dyn Storage>) -> Result<Config> {
    let chains = config.playground.chains.clone();
    let ids: Vec<ChainId> = chains.iter().map(|c| c.chain_id.clone()).collect();
    let options = match &config.playground.client {
        Value::Null => ClientOptions::default(),
        table => ClientOptions::from_value(table, &ids)?,
    };
    let transports: HashMap<ChainId, Arc<dyn Transport>> = ids
        .iter()
        .map(|id| {
            let transport: Arc<dyn Transport> = Arc::new(DemoTransport::new(id.clone()));
            (id.clone(), transport)
        })
        .collect();

    let parameters = CreateConfigParameters::new(
        chains,
        ClientSource::Transports {
            transports,
            options,
        },
    )
    .with_connectors(config.playground.wallets.iter().map(wallet_connector).collect())
    .with_storage(storage)
    .with_options(config.core.clone());

    Ok(starkweb_core::create_config(parameters).await?)
}

fn wallet_connector(wallet: &WalletConfig) -> CreateConnectorFn {
    mock(MockParameters {
        id: wallet.id.clone(),
        name: wallet.name.clone(),
        accounts: wallet.accounts.iter().map(Address::new).collect(),
        chain_id: None,
        features: MockFeatures {
            reconnect: wallet.authorized,
            ..Default::default()
        },
    })
}

/// Runs one command against the session and renders its output.
pub async fn execute(session: &Config, command: Commands) -> Result<String> {
    match command {
        Commands::Status => Ok(render_status(session)),
        Commands::Chains => {
            let current = session.state().chain_id.clone();
            let mut out = String::new();
            for chain in session.chains().iter() {
                let marker = if chain.chain_id == current { "*" } else { " " };
                writeln!(out, "{} {} {}", marker, chain.chain_id, chain.name)?;
            }
            Ok(out.trim_end().to_string())
        }
        Commands::Wallets => {
            let mut out = String::new();
            for connector in session.connectors().iter() {
                writeln!(
                    out,
                    "{} ({}, {}) {:?}",
                    connector.id(),
                    connector.name(),
                    connector.kind(),
                    connector.lifecycle()
                )?;
            }
            Ok(out.trim_end().to_string())
        }
        Commands::Connect { wallet, chain } => {
            let connector = session
                .registry()
                .find_by_id(&wallet)
                .ok_or_else(|| anyhow!("unknown wallet `{}`", wallet))?;
            let mut parameters = ConnectParameters::new(connector);
            if let Some(chain) = chain {
                parameters = parameters.with_chain_id(ChainId::new(chain));
            }
            let result = connect(session, parameters).await?;
            let account = result
                .accounts
                .first()
                .map(|a| a.to_string())
                .unwrap_or_default();
            Ok(format!("Connected {} on {}", account, result.chain_id))
        }
        Commands::Disconnect { wallet } => {
            let connector = wallet
                .map(|id| {
                    session
                        .registry()
                        .find_by_id(&id)
                        .ok_or_else(|| anyhow!("unknown wallet `{}`", id))
                })
                .transpose()?;
            disconnect(session, connector).await?;
            Ok(render_status(session))
        }
        Commands::Reconnect => {
            let restored = reconnect(session, None).await?;
            Ok(format!(
                "Restored {} connection(s)\n{}",
                restored.len(),
                render_status(session)
            ))
        }
        Commands::Request { method, chain } => {
            let chain = chain.map(ChainId::new);
            let client = session.get_client(chain.as_ref())?;
            let result = client.request(&method, Value::Array(Vec::new())).await?;
            Ok(serde_json::to_string_pretty(&result)?)
        }
    }
}

fn render_status(session: &Config) -> String {
    let state = session.state();
    let account = get_account(session);
    let mut lines = vec![
        format!("status: {}", state.status),
        format!("chain: {}", state.chain_id),
        format!("connections: {}", state.connections.len()),
    ];
    if let (Some(address), Some(connector)) = (account.address, account.connector) {
        lines.push(format!("account: {} via {}", address, connector.id));
    }
    lines.join("\n")
}
