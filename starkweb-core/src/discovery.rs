//! # Provider Discovery
//!
//! Wallets announce themselves at runtime. Every announcement batch is merged
//! into the connector sequence: providers whose id is already registered are
//! skipped, and the new ones are set up and appended in one replacement.

use crate::{
    connectors::injected::{injected, InjectedProvider, InjectedTarget},
    connector::CreateConnectorFn,
    manager::{Config, WeakConfig},
};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub uuid: String,
    pub name: String,
    pub icon: String,
    /// Reverse-DNS name; becomes the connector id.
    pub rdns: String,
}

#[derive(Clone)]
pub struct ProviderDetail {
    pub info: ProviderInfo,
    pub provider: Arc<dyn InjectedProvider>,
}

impl std::fmt::Debug for ProviderDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDetail").field("info", &self.info).finish()
    }
}

impl ProviderDetail {
    pub fn connector(&self) -> CreateConnectorFn {
        injected(InjectedTarget {
            id: self.info.rdns.clone(),
            name: self.info.name.clone(),
            icon: Some(self.info.icon.clone()),
            provider: self.provider.clone(),
        })
    }
}

/// A feed of announced wallet providers.
pub trait ProviderDiscovery: Send + Sync {
    /// Every provider announced so far.
    fn providers(&self) -> Vec<ProviderDetail>;

    /// Yields the full provider list each time it changes.
    fn subscribe(&self) -> BoxStream<'static, Vec<ProviderDetail>>;
}

/// An in-process announcement board.
pub struct Announcements {
    providers_tx: watch::Sender<Vec<ProviderDetail>>,
}

impl Default for Announcements {
    fn default() -> Self {
        Self::new()
    }
}

impl Announcements {
    pub fn new() -> Self {
        let (providers_tx, _) = watch::channel(Vec::new());
        Self { providers_tx }
    }

    /// Publishes a provider. Re-announcing a known `uuid` is ignored.
    pub fn announce(&self, detail: ProviderDetail) {
        self.providers_tx.send_if_modified(|providers| {
            if providers.iter().any(|p| p.info.uuid == detail.info.uuid) {
                return false;
            }
            debug!(rdns = %detail.info.rdns, "provider announced");
            providers.push(detail);
            true
        });
    }

    pub fn clear(&self) {
        self.providers_tx.send_replace(Vec::new());
    }
}

impl ProviderDiscovery for Announcements {
    fn providers(&self) -> Vec<ProviderDetail> {
        self.providers_tx.borrow().clone()
    }

    fn subscribe(&self) -> BoxStream<'static, Vec<ProviderDetail>> {
        WatchStream::new(self.providers_tx.subscribe()).boxed()
    }
}

/// Merges one batch into the config's connector sequence. Returns how many
/// connectors were added. Concurrent merges of the same provider add it once.
///
/// Does nothing until the config has hydrated.
pub fn merge(config: &Config, batch: &[ProviderDetail]) -> usize {
    if !config.has_hydrated() {
        debug!(providers = batch.len(), "discovery batch ignored before hydration");
        return 0;
    }

    let registry = config.registry();
    let mut seen: HashSet<String> = registry.ids();
    let mut fresh = Vec::new();
    for detail in batch {
        if !seen.insert(detail.info.rdns.clone()) {
            continue;
        }
        match registry.setup(&detail.connector()) {
            Ok(connector) => fresh.push(connector),
            Err(e) => warn!(rdns = %detail.info.rdns, error = %e, "failed to set up discovered provider"),
        }
    }

    let added = registry.append_new(fresh);
    if added > 0 {
        info!(added, "discovered providers registered");
    }
    added
}

/// Feeds discovery batches into `config` until it is dropped.
pub(crate) async fn run(
    config: WeakConfig,
    mut batches: BoxStream<'static, Vec<ProviderDetail>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            batch = batches.next() => {
                let Some(batch) = batch else { break };
                let Some(config) = config.upgrade() else { break };
                merge(&config, &batch);
            }
        }
    }
    debug!("provider discovery stopped");
}
