//! `Dragonfly` (Redis-compatible) connection and typed key operations.
//!
//! `Dragonfly` holds the durable job registry so repeat definitions survive
//! restarts and registration stays deduplicated across processes.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `jobs:repeat:{id}` | JSON | Repeat definition for one job id |
//! | `jobs:repeat:index` | Set | Registered job ids |
//! | `jobs:history:{id}:completed` | List | Completed executions, newest last |
//! | `jobs:history:{id}:failed` | List | Failed executions, newest last |

use fred::prelude::*;
use fred::types::SetOptions;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    // =========================================================================
    // JSON values
    // =========================================================================

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Store `value` at `key` only if the key is absent (`SET ... NX`).
    ///
    /// Returns `true` if this call wrote the key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json_if_absent<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<bool, DbError> {
        let json = serde_json::to_string(value)?;
        let written: Option<String> = self
            .client
            .set(key, json.as_str(), None, Some(SetOptions::NX), false)
            .await?;
        Ok(written.is_some())
    }

    /// Read the value at `key` and deserialize it from JSON.
    ///
    /// Returns `None` when the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if deserialization fails.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s).map_err(DbError::from))
            .transpose()
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    // =========================================================================
    // Capped JSON lists
    // =========================================================================

    /// Append `value` to the list at `key` and keep only the newest `keep`
    /// entries. A `keep` of zero deletes the list.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or a write fails.
    pub async fn push_capped<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        keep: usize,
    ) -> Result<(), DbError> {
        if keep == 0 {
            return self.delete(key).await;
        }
        let json = serde_json::to_string(value)?;
        let _: u64 = self.client.rpush(key, json.as_str()).await?;
        let start = i64::try_from(keep).map_or(i64::MIN, i64::saturating_neg);
        let _: () = self.client.ltrim(key, start, -1).await?;
        Ok(())
    }

    /// Read every entry of the list at `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if deserialization or the read fails.
    pub async fn list_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, DbError> {
        let values: Vec<String> = self.client.lrange(key, 0, -1).await?;
        let mut items = Vec::with_capacity(values.len());
        for v in &values {
            items.push(serde_json::from_str(v)?);
        }
        Ok(items)
    }

    // =========================================================================
    // String sets
    // =========================================================================

    /// Add `member` to the set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_add(&self, key: &str, member: &str) -> Result<(), DbError> {
        let _: u32 = self.client.sadd(key, member).await?;
        Ok(())
    }

    /// Remove `member` from the set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_remove(&self, key: &str, member: &str) -> Result<(), DbError> {
        let _: u32 = self.client.srem(key, member).await?;
        Ok(())
    }

    /// Every member of the set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn set_members(&self, key: &str) -> Result<Vec<String>, DbError> {
        let members: Vec<String> = self.client.smembers(key).await?;
        Ok(members)
    }
}
