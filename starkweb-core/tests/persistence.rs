mod common;

use common::*;
use serde_json::{json, Value};
use starkweb_core::{
    actions::{connect, disconnect, reconnect, ConnectParameters},
    connector::Lifecycle,
    connectors::MockFeatures,
    emitter::{ConnectorEvent, EventKind},
    storage::{MemoryStorage, Storage},
    version::current_version_tag,
    ChainId, ConfigOptions, State, Status,
};
use std::sync::Arc;

const STORE_KEY: &str = "starkweb.store";

fn authorized(id: &str, account: &str) -> starkweb_core::connector::CreateConnectorFn {
    mock_wallet_with(
        id,
        account,
        MockFeatures {
            reconnect: true,
            ..Default::default()
        },
    )
}

async fn read_json(storage: &MemoryStorage, key: &str) -> Option<Value> {
    let raw = storage.get_item(key).await.expect("memory storage never fails")?;
    Some(serde_json::from_str(&raw).expect("stored values are json"))
}

#[tokio::test]
async fn snapshot_is_written_in_the_persisted_layout() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    let config = TestHarness::new()
        .with_storage(Arc::new(storage.clone()))
        .build()
        .await;
    let w1 = config.connectors()[0].clone();

    connect(&config, ConnectParameters::new(w1.clone())).await?;
    config.flush().await;

    let stored = read_json(&storage, STORE_KEY).await.expect("snapshot written");
    assert_eq!(stored["version"], json!(current_version_tag()));
    assert_eq!(stored["state"]["chainId"], json!(MAINNET));
    assert_eq!(stored["state"]["current"], json!(w1.uid()));
    assert!(stored["state"].get("status").is_none(), "status is not persisted");

    let entry = &stored["state"]["connections"][0];
    assert_eq!(entry[0], json!(w1.uid()));
    assert_eq!(entry[1]["accounts"], json!(["0xa11ce"]));
    assert_eq!(
        entry[1]["connector"],
        json!({ "chain_id": null, "id": "argentX", "name": "Mock Connector", "type": "mock", "uid": w1.uid() })
    );

    assert_eq!(
        read_json(&storage, "starkweb.recentConnectorId").await,
        Some(json!("argentX"))
    );
    Ok(())
}

#[tokio::test]
async fn restart_restores_then_reconnect_revives_the_session() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    let harness = TestHarness::new()
        .with_storage(Arc::new(storage.clone()))
        .with_connectors(vec![authorized("argentX", "0xa11ce"), authorized("braavos", "0xb0b")]);

    let first = harness.build().await;
    let braavos = first.connectors()[1].clone();
    connect(
        &first,
        ConnectParameters::new(braavos.clone()).with_chain_id(ChainId::new(SEPOLIA)),
    )
    .await?;
    first.flush().await;
    drop(first);

    let second = harness.build().await;
    let restored = second.state();
    assert_eq!(restored.current.as_deref(), Some(braavos.uid()));
    assert_eq!(restored.chain_id.as_str(), SEPOLIA);
    assert_eq!(restored.status, Status::Disconnected);

    let connections = reconnect(&second, None).await?;
    assert_eq!(connections.len(), 2);
    assert_eq!(connections[0].connector.id, "braavos", "most recent connector first");

    let state = second.state();
    let new_braavos = second.connectors()[1].clone();
    assert_eq!(state.status, Status::Connected);
    assert_eq!(state.current.as_deref(), Some(new_braavos.uid()));
    assert!(!state.connections.contains(braavos.uid()));
    assert_eq!(new_braavos.lifecycle(), Lifecycle::Connected);
    Ok(())
}

#[tokio::test]
async fn reconnect_without_authorized_wallets_resets() -> anyhow::Result<()> {
    let config = TestHarness::new().build().await;

    let connections = reconnect(&config, None).await?;
    assert!(connections.is_empty());
    assert_eq!(*config.state(), State::initial(ChainId::new(MAINNET)));
    Ok(())
}

#[tokio::test]
async fn reconnect_is_skipped_while_connecting() -> anyhow::Result<()> {
    let config = TestHarness::new()
        .with_connectors(vec![authorized("argentX", "0xa11ce")])
        .build()
        .await;
    config.update_state(|x| State {
        status: Status::Connecting,
        ..x.clone()
    });

    assert!(reconnect(&config, None).await?.is_empty());
    assert_eq!(config.state().status, Status::Connecting);
    Ok(())
}

#[tokio::test]
async fn mismatched_version_keeps_only_the_chain() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    let stale = json!({
        "version": current_version_tag() + 1,
        "state": {
            "chainId": "SN_SEPOLIA",
            "current": "old-uid",
            "connections": [["old-uid", { "accounts": ["0x1"], "chainId": "SN_SEPOLIA" }]],
        }
    });
    storage.set_item(STORE_KEY, &stale.to_string()).await?;

    let config = TestHarness::new()
        .with_storage(Arc::new(storage))
        .build()
        .await;
    assert_eq!(*config.state(), State::initial(ChainId::new(SEPOLIA)));
    Ok(())
}

#[tokio::test]
async fn unreadable_snapshot_starts_fresh() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    storage.set_item(STORE_KEY, "{not json").await?;

    let config = TestHarness::new()
        .with_storage(Arc::new(storage))
        .build()
        .await;
    assert_eq!(*config.state(), State::initial(ChainId::new(MAINNET)));
    assert!(config.has_hydrated());
    Ok(())
}

#[tokio::test]
async fn deferred_hydration_holds_back_writes() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    let mut harness = TestHarness::new().with_storage(Arc::new(storage.clone()));

    let first = harness.build().await;
    connect(&first, ConnectParameters::new(first.connectors()[0].clone())).await?;
    first.flush().await;
    let written = read_json(&storage, STORE_KEY).await;
    drop(first);

    harness.options = ConfigOptions {
        ssr: true,
        ..ConfigOptions::default()
    };
    let deferred = harness.build().await;
    assert!(!deferred.has_hydrated());
    assert!(deferred.state().connections.is_empty());

    deferred.set_state(State::initial(ChainId::new(SEPOLIA)));
    deferred.flush().await;
    assert_eq!(read_json(&storage, STORE_KEY).await, written);

    deferred.hydrate().await?;
    assert!(deferred.has_hydrated());
    assert_eq!(deferred.state().connections.len(), 1);
    Ok(())
}

#[tokio::test]
async fn disconnect_records_the_promoted_connector() -> anyhow::Result<()> {
    let storage = MemoryStorage::new();
    let config = TestHarness::new()
        .with_storage(Arc::new(storage.clone()))
        .build()
        .await;
    let connectors = config.connectors();

    connect(&config, ConnectParameters::new(connectors[0].clone())).await?;
    connect(&config, ConnectParameters::new(connectors[1].clone())).await?;
    assert_eq!(config.recent_connector_id().await?.as_deref(), Some("braavos"));

    disconnect(&config, None).await?;
    assert_eq!(config.recent_connector_id().await?.as_deref(), Some("argentX"));
    Ok(())
}

#[tokio::test]
async fn connectors_left_out_by_reconnect_wait_for_connect_again() -> anyhow::Result<()> {
    let config = TestHarness::new()
        .with_connectors(vec![mock_wallet("argentX", "0xa11ce"), authorized("braavos", "0xb0b")])
        .build()
        .await;
    let connectors = config.connectors();
    let (w1, w2) = (connectors[0].clone(), connectors[1].clone());

    connect(&config, ConnectParameters::new(w1.clone())).await?;
    let connections = reconnect(&config, None).await?;
    assert_eq!(connections.len(), 1);
    assert_eq!(config.state().current.as_deref(), Some(w2.uid()));

    assert_eq!(w1.lifecycle(), Lifecycle::AwaitingConnect);
    let counts = |kind| w1.emitter().listener_count(kind);
    assert_eq!(
        (counts(EventKind::Connect), counts(EventKind::Change), counts(EventKind::Disconnect)),
        (1, 0, 0)
    );

    w1.emitter().emit(ConnectorEvent::Connect {
        accounts: vec![addr("0xa11ce")],
        chain_id: ChainId::new(MAINNET),
    });
    let state = config.state();
    assert!(state.connections.contains(w1.uid()));
    assert_eq!(state.current.as_deref(), Some(w1.uid()));
    assert_eq!(w1.lifecycle(), Lifecycle::Connected);
    Ok(())
}
