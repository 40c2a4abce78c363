//! # Event Bridge
//!
//! Keeps the session store consistent with the lifecycle events each connector
//! publishes. A connector carries exactly one of two listener sets at a time:
//! `{connect}` while it waits for a connection, `{change, disconnect}` while it
//! is connected. Switching sets is a side effect of entering a [`Lifecycle`],
//! and entering the lifecycle a connector is already in changes nothing.

use crate::{
    connector::{Connector, Lifecycle},
    emitter::{ConnectorEvent, EventData, EventKind},
    state::{Connection, State, Status},
    store::WeakStore,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type ConnectorList = Vec<Arc<Connector>>;

/// Routes connector events into session-store transitions.
///
/// Holds only weak handles: the bridge lives inside listener closures owned by
/// the connectors it serves.
#[derive(Clone)]
pub struct EventBridge {
    state: WeakStore<State>,
    connectors: WeakStore<ConnectorList>,
}

impl EventBridge {
    pub(crate) fn new(state: WeakStore<State>, connectors: WeakStore<ConnectorList>) -> Self {
        Self { state, connectors }
    }

    /// Moves `connector` into `next`, detaching the listeners of its current
    /// lifecycle and attaching those of the new one.
    pub(crate) fn transition(&self, connector: &Connector, next: Lifecycle) {
        let mut wiring = connector.wiring.lock();
        if wiring.lifecycle == next {
            return;
        }

        let emitter = connector.emitter();
        for (kind, id) in wiring.listeners.drain(..) {
            emitter.off(kind, id);
        }

        match next {
            Lifecycle::AwaitingConnect => {
                let bridge = self.clone();
                let id = emitter.on(EventKind::Connect, move |data| bridge.on_connect(data));
                wiring.listeners.push((EventKind::Connect, id));
            }
            Lifecycle::Connected => {
                let bridge = self.clone();
                let id = emitter.on(EventKind::Change, move |data| bridge.on_change(data));
                wiring.listeners.push((EventKind::Change, id));

                let bridge = self.clone();
                let id = emitter.on(EventKind::Disconnect, move |data| {
                    bridge.on_disconnect(data)
                });
                wiring.listeners.push((EventKind::Disconnect, id));
            }
            Lifecycle::Detached | Lifecycle::Disconnecting => {}
        }

        debug!(uid = %connector.uid(), from = ?wiring.lifecycle, to = ?next, "connector lifecycle");
        wiring.lifecycle = next;
    }

    fn find_connector(&self, uid: &str) -> Option<Arc<Connector>> {
        let connectors = self.connectors.upgrade()?;
        let list = connectors.get_state();
        list.iter().find(|c| c.uid() == uid).cloned()
    }

    /// A provider reported a connection that no `connect` call initiated.
    pub fn on_connect(&self, data: &EventData) {
        let ConnectorEvent::Connect { accounts, chain_id } = &data.event else {
            return;
        };
        let Some(state) = self.state.upgrade() else {
            return;
        };

        let status = state.get_state().status;
        if matches!(status, Status::Connecting | Status::Reconnecting) {
            debug!(uid = %data.uid, ?status, "ignoring connect event while a connection is in progress");
            return;
        }

        let Some(connector) = self.find_connector(&data.uid) else {
            debug!(uid = %data.uid, "connect event for a connector that is no longer registered");
            return;
        };
        if accounts.is_empty() {
            warn!(uid = %data.uid, "connect event without accounts ignored");
            return;
        }

        self.transition(&connector, Lifecycle::Connected);

        let connection = Connection {
            accounts: accounts.clone(),
            chain_id: chain_id.clone(),
            connector: connector.info(),
        };
        state.update(|x| {
            Arc::new(State {
                connections: x.connections.with(&data.uid, connection),
                current: Some(data.uid.clone()),
                status: Status::Connected,
                chain_id: x.chain_id.clone(),
            })
        });
        info!(uid = %data.uid, connector = %connector.id(), %chain_id, "connector connected by provider");
    }

    /// Accounts or chain changed on a live connection.
    pub fn on_change(&self, data: &EventData) {
        let ConnectorEvent::Change { accounts, chain_id } = &data.event else {
            return;
        };
        let Some(state) = self.state.upgrade() else {
            return;
        };

        state.update(|x| {
            let Some(connection) = x.connections.get(&data.uid) else {
                return x.clone();
            };
            let next = Connection {
                accounts: accounts
                    .clone()
                    .filter(|accounts| !accounts.is_empty())
                    .unwrap_or_else(|| connection.accounts.clone()),
                chain_id: chain_id
                    .clone()
                    .unwrap_or_else(|| connection.chain_id.clone()),
                connector: connection.connector.clone(),
            };
            if &next == connection {
                return x.clone();
            }
            Arc::new(State {
                connections: x.connections.with(&data.uid, next),
                ..(**x).clone()
            })
        });
        debug!(uid = %data.uid, "connection changed");
    }

    /// The provider dropped the connection. The connector goes back to
    /// awaiting `connect` so it can be reconnected later.
    pub fn on_disconnect(&self, data: &EventData) {
        if let Some(connector) = self.find_connector(&data.uid) {
            self.transition(&connector, Lifecycle::AwaitingConnect);
        }
        let Some(state) = self.state.upgrade() else {
            return;
        };

        state.update(|x| {
            let next = x.without_connection(&data.uid);
            if next == **x {
                return x.clone();
            }
            Arc::new(next)
        });
        info!(uid = %data.uid, "connector disconnected");
    }
}
