/// Provides a `sled`-based implementation of the storage trait defined in
/// `starkweb-core`.
use anyhow::Result;
use async_trait::async_trait;
use sled::Db;

use starkweb_core::storage::Storage;

/// A `sled`-backed implementation of the `Storage` trait.
#[derive(Clone)]
pub struct SledStorage {
    db: Db,
}

impl SledStorage {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Opens (or creates) the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(sled::open(path)?))
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .db
            .get(key)?
            .and_then(|v| String::from_utf8(v.to_vec()).ok());
        Ok(result)
    }

    /// Flushed to disk before returning.
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key, value.as_bytes())?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.db.remove(key)?;
        self.db.flush_async().await?;
        Ok(())
    }
}
