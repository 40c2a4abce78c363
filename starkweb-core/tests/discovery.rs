mod common;

use common::*;
use starkweb_core::{
    actions::{connect, ConnectParameters},
    connectors::WalletEvent,
    discovery::{self, Announcements},
    ChainId, ConfigOptions, Config, Status,
};
use std::sync::{Arc, Barrier};

async fn config_with(announcements: &Arc<Announcements>, options: ConfigOptions) -> Config {
    let mut harness = TestHarness::new();
    harness.options = options;
    let parameters = harness.parameters().with_discovery(announcements.clone());
    starkweb_core::create_config(parameters)
        .await
        .expect("config should build")
}

#[tokio::test]
async fn announced_providers_are_merged_once() {
    let announcements = Arc::new(Announcements::new());
    let (wallet, _events) = TestProvider::new("0x1");
    announcements.announce(detail("com.okx.wallet", wallet.clone()));

    let config = config_with(&announcements, ConfigOptions::default()).await;
    assert_eq!(config.connectors().len(), 3);

    announcements.announce(detail("com.okx.wallet", wallet.clone()));
    announcements.announce(detail("io.keplr", wallet.clone()));
    assert!(eventually(|| config.connectors().len() == 4).await);

    let replay = vec![
        detail("com.okx.wallet", wallet.clone()),
        detail("io.keplr", wallet.clone()),
    ];
    assert_eq!(discovery::merge(&config, &replay), 0);
    assert_eq!(config.connectors().len(), 4);

    let ids: Vec<String> = config.connectors().iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, vec!["argentX", "braavos", "com.okx.wallet", "io.keplr"]);
}

#[tokio::test]
async fn duplicates_inside_one_batch_and_known_ids_are_skipped() {
    let announcements = Arc::new(Announcements::new());
    let config = config_with(&announcements, ConfigOptions::default()).await;
    let (wallet, _events) = TestProvider::new("0x1");

    let batch = vec![
        detail("argentX", wallet.clone()),
        detail("xyz.fresh", wallet.clone()),
        detail("xyz.fresh", wallet.clone()),
    ];
    assert_eq!(discovery::merge(&config, &batch), 1);
    assert_eq!(config.connectors().len(), 3);
}

#[tokio::test]
async fn discovery_waits_for_hydration() -> anyhow::Result<()> {
    let announcements = Arc::new(Announcements::new());
    let (wallet, _events) = TestProvider::new("0x1");
    announcements.announce(detail("com.okx.wallet", wallet.clone()));

    let options = ConfigOptions {
        ssr: true,
        ..ConfigOptions::default()
    };
    let config = config_with(&announcements, options).await;
    assert_eq!(config.connectors().len(), 2);
    assert_eq!(discovery::merge(&config, &[detail("io.keplr", wallet.clone())]), 0);

    config.hydrate().await?;
    assert_eq!(config.connectors().len(), 3);
    Ok(())
}

#[tokio::test]
async fn discovery_can_be_switched_off() {
    let announcements = Arc::new(Announcements::new());
    let (wallet, _events) = TestProvider::new("0x1");
    announcements.announce(detail("com.okx.wallet", wallet));

    let options = ConfigOptions {
        multi_injected_provider_discovery: false,
        ..ConfigOptions::default()
    };
    let config = config_with(&announcements, options).await;
    assert_eq!(config.connectors().len(), 2);
}

#[tokio::test]
async fn wallet_events_drive_the_session() -> anyhow::Result<()> {
    let announcements = Arc::new(Announcements::new());
    let (wallet, events) = TestProvider::new("0x1");
    announcements.announce(detail("com.okx.wallet", wallet.clone()));
    let config = config_with(&announcements, ConfigOptions::default()).await;
    let okx = config.connectors()[2].clone();
    assert_eq!(okx.kind(), "injected");

    let connected = connect(
        &config,
        ConnectParameters::new(okx.clone()).with_chain_id(ChainId::new(SEPOLIA)),
    )
    .await?;
    assert_eq!(connected.chain_id.as_str(), SEPOLIA);
    assert_eq!(wallet.chain_id.lock().as_str(), SEPOLIA, "wallet was asked to switch");

    events.send(WalletEvent::AccountsChanged(vec![addr("0x2")]))?;
    assert!(
        eventually(|| {
            config
                .state()
                .current_connection()
                .is_some_and(|c| c.accounts == vec![addr("0x2")])
        })
        .await
    );

    events.send(WalletEvent::NetworkChanged {
        chain_id: Some(ChainId::new(MAINNET)),
        accounts: None,
    })?;
    assert!(eventually(|| config.state().chain_id.as_str() == MAINNET).await);

    events.send(WalletEvent::AccountsChanged(vec![]))?;
    assert!(eventually(|| config.state().status == Status::Disconnected).await);

    // Accounts reappearing while disconnected count as a wallet-initiated connect.
    events.send(WalletEvent::AccountsChanged(vec![addr("0x3")]))?;
    assert!(eventually(|| config.state().current.as_deref() == Some(okx.uid())).await);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_merges_register_a_provider_once() {
    const THREADS: usize = 8;
    let (wallet, _events) = TestProvider::new("0x1");

    for _ in 0..50 {
        let announcements = Arc::new(Announcements::new());
        let config = config_with(&announcements, ConfigOptions::default()).await;
        let barrier = Barrier::new(THREADS);

        let added: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let (config, barrier, wallet) = (&config, &barrier, wallet.clone());
                    scope.spawn(move || {
                        let batch = [detail("x.dup", wallet)];
                        barrier.wait();
                        discovery::merge(config, &batch)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("merge thread panicked"))
                .sum()
        });

        assert_eq!(added, 1);
        let copies = config
            .connectors()
            .iter()
            .filter(|c| c.id() == "x.dup")
            .count();
        assert_eq!(copies, 1);
        assert_eq!(config.connectors().len(), 3);
    }
}
