use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// A string-keyed persistent backend.
/// This allows for different database implementations.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the raw value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// An in-memory backend. Contents are lost with the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// A backend that stores nothing and always reads empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

#[async_trait]
impl Storage for NoopStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_item(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Namespaces every key as `"{prefix}.{key}"` and (de)serializes JSON values.
#[derive(Clone)]
pub struct KeyedStorage {
    backend: Arc<dyn Storage>,
    prefix: String,
}

impl KeyedStorage {
    pub fn new(backend: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    pub fn backend(&self) -> &Arc<dyn Storage> {
        &self.backend
    }

    pub async fn get_raw(&self, name: &str) -> Result<Option<String>> {
        self.backend.get_item(&self.key(name)).await
    }

    pub async fn set_raw(&self, name: &str, value: &str) -> Result<()> {
        self.backend.set_item(&self.key(name), value).await
    }

    /// Reads and decodes `name`. A value that fails to decode reads as absent.
    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let raw = self.get_raw(name).await?;
        Ok(raw.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub async fn set<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(name, &raw).await
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.backend.remove_item(&self.key(name)).await
    }
}

impl std::fmt::Debug for KeyedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStorage")
            .field("prefix", &self.prefix)
            .finish()
    }
}
