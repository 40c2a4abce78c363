use crate::{
    connector::{Connector, Lifecycle},
    error::Result,
    manager::Config,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Disconnects `connector`, or the current connection when `None`.
///
/// The connection is removed from the snapshot. When others remain, the first
/// remaining one in insertion order becomes current; when none remain the
/// snapshot resets to disconnected.
pub async fn disconnect(config: &Config, connector: Option<Arc<Connector>>) -> Result<()> {
    let state = config.state();
    let connector = connector.or_else(|| {
        state
            .current
            .as_deref()
            .and_then(|uid| config.registry().find(uid))
    });
    let uid = match (&connector, &state.current) {
        (Some(connector), _) => connector.uid().to_string(),
        (None, Some(current)) => current.clone(),
        (None, None) => {
            debug!("nothing to disconnect");
            return Ok(());
        }
    };

    if let Some(connector) = &connector {
        let previous = connector.lifecycle();
        config
            .bridge()
            .transition(connector, Lifecycle::Disconnecting);
        if let Err(e) = connector.disconnect().await {
            warn!(%uid, connector = %connector.id(), error = %e, "provider refused to disconnect");
            config.bridge().transition(connector, previous);
            return Err(e.into());
        }
        config
            .bridge()
            .transition(connector, Lifecycle::AwaitingConnect);
    }

    config.update_state(|x| x.without_connection(&uid));

    let next = config.state();
    if let Some(connection) = next.current_connection() {
        config
            .set_recent_connector_id(&connection.connector.id)
            .await?;
    }
    info!(%uid, remaining = next.connections.len(), "disconnected");
    Ok(())
}
