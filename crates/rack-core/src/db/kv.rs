//! Namespaced key-value backing store

use async_trait::async_trait;

use crate::error::Result;

use super::Database;

/// Durable string key-value storage, partitioned by namespace.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value
    async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Remove a value, returning whether it existed
    async fn remove(&self, namespace: &str, key: &str) -> Result<bool>;

    /// All entries in a namespace, ordered by key
    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>>;
}

/// libSQL implementation of `KeyValueStore`
pub struct LibSqlKeyValueStore {
    db: Database,
}

impl LibSqlKeyValueStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a file-backed store at `path`.
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open a throwaway in-memory store.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }
}

#[async_trait]
impl KeyValueStore for LibSqlKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT value FROM kv WHERE namespace = ? AND key = ?",
                [namespace, key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO kv (namespace, key, value) VALUES (?, ?, ?)",
                [namespace, key, value],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let affected = self
            .db
            .connection()
            .execute(
                "DELETE FROM kv WHERE namespace = ? AND key = ?",
                [namespace, key],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT key, value FROM kv WHERE namespace = ? ORDER BY key",
                [namespace],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push((row.get::<String>(0)?, row.get::<String>(1)?));
        }
        Ok(entries)
    }
}
