use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use starkweb_core::{client::Transport, ChainId};
use std::sync::atomic::{AtomicU64, Ordering};

/// An offline stand-in for a JSON-RPC node. Answers a handful of read
/// methods from local state so the playground works without network access.
pub struct DemoTransport {
    chain_id: ChainId,
    block_number: AtomicU64,
}

impl DemoTransport {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            block_number: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Transport for DemoTransport {
    fn kind(&self) -> &str {
        "demo"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        tracing::debug!(chain_id = %self.chain_id, method, %params, "demo request");
        match method {
            "starknet_chainId" => Ok(json!(self.chain_id)),
            "starknet_blockNumber" => Ok(json!(self.block_number.fetch_add(1, Ordering::Relaxed))),
            "starknet_specVersion" => Ok(json!("0.7.1")),
            other => bail!("method `{}` is not available offline", other),
        }
    }
}
