//! JSON key-value store backing the settings and media-metadata tiers

use libsql::Connection;
use serde_json::Value;

use crate::error::{Error, Result};

/// Async key-value storage of JSON documents.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read a value; an absent key is `Ok(None)`.
    async fn get_value(&self, key: &str) -> Result<Option<Value>>;

    /// Write (or overwrite) a value.
    async fn set_value(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove keys; absent keys are ignored.
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Every stored key.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// libSQL implementation of `KeyValueStore` over the `kv_items` table
pub struct LibSqlKeyValueStore<'a> {
    conn: &'a Connection,
    label: &'static str,
    quota_bytes: Option<u64>,
}

impl<'a> LibSqlKeyValueStore<'a> {
    /// Create a store without a quota
    pub const fn new(conn: &'a Connection, label: &'static str) -> Self {
        Self {
            conn,
            label,
            quota_bytes: None,
        }
    }

    /// Reject writes that would push total usage above `quota_bytes`.
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Bytes used by all keys except `excluding`.
    async fn usage_bytes(&self, excluding: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM kv_items WHERE key != ?",
                [excluding],
            )
            .await?;
        let used: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(used).unwrap_or_default())
    }
}

impl KeyValueStore for LibSqlKeyValueStore<'_> {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_items WHERE key = ?", [key])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let raw: String = row.get(0)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                tracing::warn!(store = self.label, key, %error, "Ignoring unreadable stored value");
                Ok(None)
            }
        }
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        let payload = serde_json::to_string(value)?;

        if let Some(quota_bytes) = self.quota_bytes {
            let requested_bytes = (key.len() + payload.len()) as u64;
            let projected = self.usage_bytes(key).await? + requested_bytes;
            if projected > quota_bytes {
                return Err(Error::QuotaExceeded {
                    store: self.label,
                    requested_bytes,
                    quota_bytes,
                });
            }
        }

        self.conn
            .execute(
                "INSERT INTO kv_items (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, payload.as_str()],
            )
            .await?;
        tracing::debug!(store = self.label, key, bytes = payload.len(), "Stored value");
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.conn
                .execute("DELETE FROM kv_items WHERE key = ?", [*key])
                .await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT key FROM kv_items ORDER BY key", ())
            .await?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}
