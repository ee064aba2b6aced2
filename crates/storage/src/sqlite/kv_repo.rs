use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{KeyValueStore, StorageError};

use super::SqliteStore;

// SQLITE_FULL primary result code.
const SQLITE_FULL: &str = "13";

fn map_sqlx_err(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(SQLITE_FULL) {
            return StorageError::QuotaExceeded;
        }
    }
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_err)?;

        row.map(|row| {
            row.try_get("value")
                .map_err(|err| StorageError::Serialization(err.to_string()))
        })
        .transpose()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Filtered in Rust: LIKE treats `_` as a wildcard and our keys
        // contain underscores. The table holds a handful of rows at most.
        let rows = sqlx::query("SELECT key FROM kv_entries ORDER BY key")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_err)?;

        let mut keys = Vec::new();
        for row in rows {
            let key: String = row
                .try_get("key")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
