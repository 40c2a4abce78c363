//! Per-connector event emitter.
//!
//! Each registered connector owns one [`Emitter`], tagged with the connector's `uid`.
//! Wallet implementations publish lifecycle events on it; the event bridge listens.

use crate::types::{Address, ChainId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Discriminant used to key listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Change,
    Disconnect,
    Error,
    Message,
}

/// An event published by a connector.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Connect {
        accounts: Vec<Address>,
        chain_id: ChainId,
    },
    /// Omitted fields keep their previous value.
    Change {
        accounts: Option<Vec<Address>>,
        chain_id: Option<ChainId>,
    },
    Disconnect,
    Error(String),
    Message {
        kind: String,
        data: Option<serde_json::Value>,
    },
}

impl ConnectorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectorEvent::Connect { .. } => EventKind::Connect,
            ConnectorEvent::Change { .. } => EventKind::Change,
            ConnectorEvent::Disconnect => EventKind::Disconnect,
            ConnectorEvent::Error(_) => EventKind::Error,
            ConnectorEvent::Message { .. } => EventKind::Message,
        }
    }

    pub fn message(kind: impl Into<String>) -> Self {
        ConnectorEvent::Message {
            kind: kind.into(),
            data: None,
        }
    }
}

/// An event together with the `uid` of the emitter it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub uid: String,
    pub event: ConnectorEvent,
}

pub type ListenerId = u64;

pub type EventListener = Arc<dyn Fn(&EventData) + Send + Sync>;

pub struct Emitter {
    uid: String,
    listeners: DashMap<EventKind, Vec<(ListenerId, EventListener)>>,
    next_listener_id: AtomicU64,
}

impl Emitter {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(0),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&EventData) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not attached.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let Some(mut entry) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(lid, _)| *lid != id);
        before != entry.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, |entry| entry.len())
    }

    /// Synchronously invokes every listener registered for the event's kind.
    ///
    /// Listeners are snapshotted first, so a listener may attach or detach
    /// listeners on this emitter while it runs.
    pub fn emit(&self, event: ConnectorEvent) {
        let kind = event.kind();
        let listeners: Vec<EventListener> = match self.listeners.get(&kind) {
            Some(entry) => entry.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };
        tracing::trace!(uid = %self.uid, ?kind, listeners = listeners.len(), "emitting connector event");

        let data = EventData {
            uid: self.uid.clone(),
            event,
        };
        for listener in listeners {
            listener(&data);
        }
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").field("uid", &self.uid).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn listener_may_detach_itself_while_emitting() {
        let emitter = Arc::new(Emitter::new("abc"));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let id_slot = Arc::new(Mutex::new(None));
        let (weak, slot, sink) = (Arc::downgrade(&emitter), id_slot.clone(), seen.clone());
        let id = emitter.on(EventKind::Disconnect, move |data| {
            sink.lock().push(data.uid.clone());
            if let (Some(emitter), Some(id)) = (weak.upgrade(), *slot.lock()) {
                emitter.off(EventKind::Disconnect, id);
            }
        });
        *id_slot.lock() = Some(id);

        emitter.emit(ConnectorEvent::Disconnect);
        emitter.emit(ConnectorEvent::Disconnect);

        assert_eq!(*seen.lock(), vec!["abc".to_string()]);
        assert_eq!(emitter.listener_count(EventKind::Disconnect), 0);
    }
}
