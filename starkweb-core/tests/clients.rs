mod common;

use common::*;
use serde_json::json;
use starkweb_core::{
    actions::{connect, ConnectParameters},
    client::{ChainValue, Client, ClientOptions, ClientSource, Transport},
    Chain, ChainId, CreateConfigParameters, Error,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn clients_are_memoized_per_chain() -> anyhow::Result<()> {
    let config = TestHarness::new().build().await;

    let first = config.get_client(None)?;
    let again = config.get_client(Some(&ChainId::new(MAINNET)))?;
    let sepolia = config.get_client(Some(&ChainId::new(SEPOLIA)))?;

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &sepolia));
    assert_eq!(first.chain.chain_id.as_str(), MAINNET);
    assert_eq!(first.polling_interval, Duration::from_millis(4_000));

    let echoed = sepolia.request("starknet_blockNumber", json!([])).await?;
    assert_eq!(echoed["chain"], json!(SEPOLIA));
    Ok(())
}

#[tokio::test]
async fn default_client_follows_the_session_chain() -> anyhow::Result<()> {
    let config = TestHarness::new().build().await;
    let w1 = config.connectors()[0].clone();

    connect(
        &config,
        ConnectParameters::new(w1).with_chain_id(ChainId::new(SEPOLIA)),
    )
    .await?;
    assert_eq!(config.get_client(None)?.chain.chain_id.as_str(), SEPOLIA);
    Ok(())
}

#[tokio::test]
async fn unconfigured_chain_falls_back_to_the_current_client() -> anyhow::Result<()> {
    let config = TestHarness::new().build().await;
    let unknown = ChainId::new("0xdead");

    let err = config.get_client(Some(&unknown)).expect_err("nothing built yet");
    assert!(matches!(err, Error::ChainNotConfigured));

    let current = config.get_client(None)?;
    let fallback = config.get_client(Some(&unknown))?;
    assert!(Arc::ptr_eq(&current, &fallback));
    Ok(())
}

#[tokio::test]
async fn replacing_chains_drops_cached_clients() -> anyhow::Result<()> {
    let config = TestHarness::new().build().await;
    let before = config.get_client(None)?;

    config.set_chains(vec![]);
    assert_eq!(config.chains().len(), 2, "empty chain lists are ignored");
    assert!(Arc::ptr_eq(&before, &config.get_client(None)?));

    config.set_chains(vec![Chain::new(MAINNET, "Starknet Mainnet")]);
    let after = config.get_client(None)?;
    assert!(!Arc::ptr_eq(&before, &after));

    // Sepolia is no longer configured; the current chain's client stands in.
    let fallback = config.get_client(Some(&ChainId::new(SEPOLIA)))?;
    assert!(Arc::ptr_eq(&after, &fallback));
    Ok(())
}

#[tokio::test]
async fn per_chain_options_are_resolved() -> anyhow::Result<()> {
    let chains = chains();
    let ids: Vec<ChainId> = chains.iter().map(|c| c.chain_id.clone()).collect();
    let options = ClientOptions::from_value(
        &json!({
            "polling-interval": { MAINNET: 1_000 },
            "batch": { "multicall": false },
        }),
        &ids,
    )?;
    assert!(matches!(options.polling_interval, Some(ChainValue::PerChain(_))));

    let ClientSource::Transports { transports, .. } = transports(&chains) else {
        unreachable!("helper builds transports");
    };
    let parameters = CreateConfigParameters::new(
        chains,
        ClientSource::Transports { transports, options },
    );
    let config = starkweb_core::create_config(parameters).await?;

    let mainnet = config.get_client(Some(&ChainId::new(MAINNET)))?;
    let sepolia = config.get_client(Some(&ChainId::new(SEPOLIA)))?;
    assert_eq!(mainnet.polling_interval, Duration::from_millis(1_000));
    assert_eq!(mainnet.cache_time, Duration::from_millis(1_000));
    assert_eq!(sepolia.polling_interval, Duration::from_millis(4_000));
    assert!(!mainnet.batch.multicall && !sepolia.batch.multicall);
    Ok(())
}

#[tokio::test]
async fn custom_factory_and_missing_transport() -> anyhow::Result<()> {
    let factory = ClientSource::Factory(Arc::new(|chain: &Chain| {
        let transport: Arc<dyn Transport> = Arc::new(EchoTransport {
            chain_id: chain.chain_id.clone(),
        });
        let mut client = Client::new(chain.clone(), transport);
        client.polling_interval = Duration::from_millis(250);
        client
    }));
    let config = starkweb_core::create_config(CreateConfigParameters::new(chains(), factory)).await?;
    assert_eq!(config.get_client(None)?.polling_interval, Duration::from_millis(250));

    let only_mainnet = ClientSource::Transports {
        transports: HashMap::from([(
            ChainId::new(MAINNET),
            Arc::new(EchoTransport {
                chain_id: ChainId::new(MAINNET),
            }) as Arc<dyn Transport>,
        )]),
        options: ClientOptions::default(),
    };
    let config =
        starkweb_core::create_config(CreateConfigParameters::new(chains(), only_mainnet)).await?;
    let err = config
        .get_client(Some(&ChainId::new(SEPOLIA)))
        .expect_err("no transport for sepolia");
    assert!(matches!(err, Error::TransportMissing(id) if id.as_str() == SEPOLIA));
    Ok(())
}

#[tokio::test]
async fn empty_chain_list_is_rejected() {
    let result = starkweb_core::create_config(CreateConfigParameters::new(vec![], transports(&[]))).await;
    assert!(matches!(result, Err(Error::NoChainsConfigured)));
}
