//! # Session Snapshot
//!
//! The immutable value held by the session store, the ordered connection map it
//! contains, and the persisted subset written to storage.

use crate::types::{string_to_hex, Address, ChainId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Disconnected => "disconnected",
            Status::Connecting => "connecting",
            Status::Connected => "connected",
            Status::Reconnecting => "reconnecting",
        })
    }
}

/// The identifying fields of a connector, which is all a snapshot keeps of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    pub chain_id: Option<ChainId>,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Never empty; the first entry is the active account.
    pub accounts: Vec<Address>,
    pub chain_id: ChainId,
    pub connector: ConnectorInfo,
}

/// Connections keyed by connector `uid`, in insertion order.
///
/// Every mutation returns a new map; the receiver is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connections(Vec<(String, Connection)>);

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, uid: &str) -> Option<&Connection> {
        self.0.iter().find(|(key, _)| key == uid).map(|(_, c)| c)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.get(uid).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Connection)> {
        self.0.iter().map(|(key, c)| (key.as_str(), c))
    }

    pub fn values(&self) -> impl Iterator<Item = &Connection> {
        self.0.iter().map(|(_, c)| c)
    }

    pub fn first(&self) -> Option<(&str, &Connection)> {
        self.iter().next()
    }

    /// Inserts or replaces `uid`. A replaced entry keeps its position.
    pub fn with(&self, uid: &str, connection: Connection) -> Self {
        let mut entries = self.0.clone();
        match entries.iter_mut().find(|(key, _)| key == uid) {
            Some(entry) => entry.1 = connection,
            None => entries.push((uid.to_string(), connection)),
        }
        Self(entries)
    }

    pub fn without(&self, uid: &str) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| key != uid)
                .cloned()
                .collect(),
        )
    }
}

impl FromIterator<(String, Connection)> for Connections {
    fn from_iter<I: IntoIterator<Item = (String, Connection)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Connections::new(), |acc, (uid, c)| acc.with(&uid, c))
    }
}

/// The session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub chain_id: ChainId,
    pub connections: Connections,
    pub current: Option<String>,
    pub status: Status,
}

const STATE_KEYS: [&str; 4] = ["chainId", "connections", "current", "status"];

impl State {
    /// The canonical disconnected snapshot for a configuration whose first chain is `chain_id`.
    pub fn initial(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            connections: Connections::new(),
            current: None,
            status: Status::Disconnected,
        }
    }

    pub fn current_connection(&self) -> Option<&Connection> {
        self.current
            .as_deref()
            .and_then(|uid| self.connections.get(uid))
    }

    /// `current`, when set, must key an entry in `connections`.
    pub fn is_well_formed(&self) -> bool {
        match &self.current {
            Some(uid) => self.connections.contains(uid),
            None => true,
        }
    }

    /// Parses an untyped snapshot. Returns `None` unless `value` is an object
    /// carrying every key of the canonical snapshot.
    pub fn from_value(value: Value) -> Option<Self> {
        let object = value.as_object()?;
        if !STATE_KEYS.iter().all(|key| object.contains_key(*key)) {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Drops a connection. The last one out resets to the canonical disconnected
    /// fields; otherwise the first remaining connection becomes `current`.
    pub fn without_connection(&self, uid: &str) -> Self {
        let connections = self.connections.without(uid);
        let current = connections.first().map(|(key, _)| key.to_string());
        match current {
            None => Self::initial(self.chain_id.clone()),
            Some(current) => Self {
                current: Some(current),
                connections,
                ..self.clone()
            },
        }
    }
}

/// The subset of [`State`] that survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartializedState {
    pub chain_id: ChainId,
    pub current: Option<String>,
    pub connections: Connections,
}

impl From<&State> for PartializedState {
    fn from(state: &State) -> Self {
        Self {
            chain_id: state.chain_id.clone(),
            current: state.current.clone(),
            connections: state.connections.clone(),
        }
    }
}

impl PartializedState {
    /// Applies the persisted fields over `base`, keeping its `status`.
    pub fn merge_into(self, base: &State) -> State {
        State {
            chain_id: self.chain_id,
            connections: self.connections,
            current: self.current,
            status: base.status,
        }
    }
}

/// The on-disk layout: `{ "state": {...}, "version": N }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEnvelope {
    pub state: Value,
    pub version: u32,
}

/// Upgrades a snapshot written by a different release.
///
/// Only the chain id is carried over, hex-encoded when it was stored as a
/// string; everything else is reset to `initial`.
pub fn migrate(persisted: &Value, initial: State) -> State {
    let chain_id = persisted
        .get("chainId")
        .and_then(Value::as_str)
        .map(|raw| ChainId::new(string_to_hex(raw)))
        .unwrap_or_else(|| initial.chain_id.clone());
    State {
        chain_id,
        ..initial
    }
}
