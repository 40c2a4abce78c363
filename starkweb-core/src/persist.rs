//! # Persistence Worker
//!
//! Snapshot writes are produced synchronously by store listeners but storage is
//! asynchronous, so writes are queued to a background [`PersistWorker`] which
//! applies them to storage one at a time, in the order they were produced.

use crate::{
    error::{Error, Result},
    state::{migrate, PartializedState, PersistedEnvelope, State},
    storage::KeyedStorage,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Storage name of the persisted snapshot.
pub const STORE_KEY: &str = "store";
/// Storage name of the id of the last connector the user connected with.
pub const RECENT_CONNECTOR_KEY: &str = "recentConnectorId";

/// Defines commands that can be sent to the persistence task.
#[derive(Debug)]
pub enum PersistCommand {
    Write(PartializedState),
    /// Acknowledged once every earlier write has been applied.
    Flush(oneshot::Sender<()>),
}

#[derive(Clone, Debug)]
pub struct PersistHandle {
    command_tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    pub fn write(&self, state: PartializedState) {
        if self.command_tx.send(PersistCommand::Write(state)).is_err() {
            warn!("persistence worker is down, state write dropped");
        }
    }

    /// Waits until every write queued so far has reached storage.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.command_tx.send(PersistCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

/// A background task that owns all snapshot writes to storage.
pub struct PersistWorker {
    storage: KeyedStorage,
    version: u32,
    command_rx: mpsc::UnboundedReceiver<PersistCommand>,
}

impl PersistWorker {
    pub fn new(storage: KeyedStorage, version: u32) -> (Self, PersistHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = Self {
            storage,
            version,
            command_rx,
        };
        (worker, PersistHandle { command_tx })
    }

    /// Runs until every [`PersistHandle`] has been dropped.
    pub async fn run(mut self) {
        debug!(version = self.version, "persistence worker started");
        while let Some(command) = self.command_rx.recv().await {
            match command {
                PersistCommand::Write(state) => {
                    if let Err(e) = self.write(&state).await {
                        error!(error = %format!("{:#}", e), "failed to persist session snapshot");
                    }
                }
                PersistCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!("persistence handles closed, worker stopping");
    }

    async fn write(&self, state: &PartializedState) -> anyhow::Result<()> {
        let envelope = PersistedEnvelope {
            state: serde_json::to_value(state)?,
            version: self.version,
        };
        self.storage.set(STORE_KEY, &envelope).await
    }
}

/// Reads the persisted snapshot and turns it into the state to install.
///
/// Returns `None` when nothing usable is stored. A snapshot from another
/// version is migrated; a matching one is merged over `current`.
pub async fn restore(
    storage: &KeyedStorage,
    version: u32,
    initial: &State,
    current: &State,
) -> Result<Option<State>> {
    let Some(raw) = storage.get_raw(STORE_KEY).await.map_err(Error::Storage)? else {
        return Ok(None);
    };

    let envelope: PersistedEnvelope = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "discarding unreadable persisted snapshot");
            return Ok(None);
        }
    };

    if envelope.version != version {
        info!(from = envelope.version, to = version, "migrating persisted snapshot");
        return Ok(Some(migrate(&envelope.state, initial.clone())));
    }

    match serde_json::from_value::<PartializedState>(envelope.state) {
        Ok(persisted) => Ok(Some(persisted.merge_into(current))),
        Err(e) => {
            warn!(error = %e, "discarding malformed persisted snapshot");
            Ok(None)
        }
    }
}
