use crate::{
    connector::{ConnectParams, Connector, Lifecycle},
    error::Result,
    manager::Config,
    state::{Connection, Connections, State, Status},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Silently restores connections with wallets that still authorize this app.
///
/// Tries `connectors` (default: every registered connector), starting with the
/// most recently used one. Every connector that restores becomes a connection;
/// the first becomes current. If none restores, the snapshot resets to
/// disconnected. A call made while a connection attempt is running does nothing.
pub async fn reconnect(
    config: &Config,
    connectors: Option<Vec<Arc<Connector>>>,
) -> Result<Vec<Connection>> {
    let status = config.state().status;
    if matches!(status, Status::Connecting | Status::Reconnecting) {
        debug!(?status, "reconnect skipped, already in progress");
        return Ok(Vec::new());
    }

    config.update_state(|x| State {
        status: if x.current.is_some() {
            Status::Reconnecting
        } else {
            Status::Connecting
        },
        ..x.clone()
    });

    let candidates = ordered_candidates(config, connectors).await;
    let mut restored: Vec<(String, Connection)> = Vec::new();
    for connector in candidates {
        let authorized = match connector.is_authorized().await {
            Ok(authorized) => authorized,
            Err(e) => {
                debug!(connector = %connector.id(), error = %e, "authorization check failed");
                false
            }
        };
        if !authorized {
            continue;
        }

        let data = match connector
            .connect(ConnectParams {
                chain_id: None,
                is_reconnecting: true,
            })
            .await
        {
            Ok(data) if !data.accounts.is_empty() => data,
            Ok(_) => continue,
            Err(e) => {
                debug!(connector = %connector.id(), error = %e, "silent connect failed");
                continue;
            }
        };

        config.bridge().transition(&connector, Lifecycle::Connected);
        restored.push((
            connector.uid().to_string(),
            Connection {
                accounts: data.accounts,
                chain_id: data.chain_id,
                connector: connector.info(),
            },
        ));
    }

    // Connections that were not restored are dropped below; their connectors
    // go back to waiting for `connect`.
    for connector in config.connectors().iter() {
        let uid = connector.uid();
        if connector.lifecycle() == Lifecycle::Connected
            && !restored.iter().any(|(restored_uid, _)| restored_uid == uid)
        {
            config.bridge().transition(connector, Lifecycle::AwaitingConnect);
        }
    }

    let current = restored.first().map(|(uid, _)| uid.clone());
    let connections: Connections = restored.iter().cloned().collect();
    config.update_state(|x| match current {
        None => State::initial(x.chain_id.clone()),
        Some(current) => State {
            chain_id: x.chain_id.clone(),
            connections,
            current: Some(current),
            status: Status::Connected,
        },
    });

    info!(restored = restored.len(), "reconnect finished");
    Ok(restored.into_iter().map(|(_, c)| c).collect())
}

/// The most recent connector first, then the persisted current one, then
/// the rest in registration order.
async fn ordered_candidates(
    config: &Config,
    connectors: Option<Vec<Arc<Connector>>>,
) -> Vec<Arc<Connector>> {
    let registered = connectors.unwrap_or_else(|| config.connectors().to_vec());
    let recent = config.recent_connector_id().await.unwrap_or_else(|e| {
        debug!(error = %e, "could not read recent connector");
        None
    });
    let persisted = config
        .state()
        .current_connection()
        .map(|c| c.connector.id.clone());

    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(registered.len());
    for id in [recent, persisted].into_iter().flatten() {
        if let Some(connector) = registered.iter().find(|c| c.id() == id) {
            if seen.insert(connector.uid().to_string()) {
                ordered.push(connector.clone());
            }
        }
    }
    for connector in registered {
        if seen.insert(connector.uid().to_string()) {
            ordered.push(connector);
        }
    }
    ordered
}
