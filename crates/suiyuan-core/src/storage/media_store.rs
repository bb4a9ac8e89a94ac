//! Blob store for background images and videos

#![allow(clippy::cast_possible_wrap)] // SQLite stores sizes as i64

use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::config::{StorageConfig, DEFAULT_QUOTA_WARN_RATIO};
use crate::error::{Error, Result};
use crate::media::{MediaData, ObjectUrlRegistry};
use crate::models::{Appearance, MediaFileInfo, MediaRecord, MediaSlot};
use crate::util::{format_file_size, unix_timestamp_millis_now};

const STORE_LABEL: &str = "media";
const SQLITE_FULL: i32 = 13;
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Usage crossed the warning ratio; the write still went through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaWarning {
    pub projected_bytes: u64,
    pub quota_bytes: u64,
    pub usage_percent: f64,
}

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq)]
pub struct PutOutcome {
    pub file: MediaFileInfo,
    pub quota_warning: Option<QuotaWarning>,
}

/// Blob store usage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub total_size_bytes: u64,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_usage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f64>,
    /// Most recently updated first
    pub files: Vec<MediaFileInfo>,
}

/// Result of `cleanup_old_files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub message: String,
}

/// Displayable handle for a theme slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotHandle {
    pub url: String,
    pub mime_type: String,
    pub last_updated: i64,
}

/// Blob storage keyed by logical name.
///
/// Only the primitive operations are required; the rest are provided on top
/// of them.
#[allow(async_fn_in_trait)]
pub trait MediaStore {
    /// Write (or overwrite) a record.
    ///
    /// `mime_type` and `size_bytes` default to a generic type and the blob length.
    async fn put(
        &self,
        name: &str,
        blob: Vec<u8>,
        mime_type: Option<&str>,
        size_bytes: Option<u64>,
    ) -> Result<PutOutcome>;

    /// Read a record; an absent record is `Ok(None)`.
    async fn get(&self, name: &str) -> Result<Option<MediaRecord>>;

    /// Record metadata without the payload.
    async fn info(&self, name: &str) -> Result<Option<MediaFileInfo>>;

    /// Delete a record. Returns `false` if nothing was stored under `name`.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Delete every record.
    async fn clear_all(&self) -> Result<()>;

    /// Metadata of every record, most recently updated first.
    async fn list(&self) -> Result<Vec<MediaFileInfo>>;

    /// Configured quota, if the store has one.
    fn quota_bytes(&self) -> Option<u64>;

    /// Handle for a record, registered in `registry`.
    async fn get_url(&self, name: &str, registry: &ObjectUrlRegistry) -> Result<Option<String>> {
        Ok(self.get(name).await?.map(|record| registry.resolve(&record)))
    }

    async fn storage_info(&self) -> Result<StorageInfo> {
        let files = self.list().await?;
        let total_size_bytes = files.iter().map(|file| file.size_bytes).sum();
        let quota_total_bytes = self.quota_bytes();
        Ok(StorageInfo {
            total_size_bytes,
            record_count: files.len(),
            quota_usage_bytes: quota_total_bytes.map(|_| total_size_bytes),
            quota_total_bytes,
            usage_percent: quota_total_bytes.map(|quota| usage_percent(total_size_bytes, quota)),
            files,
        })
    }

    /// Keep the `keep_count` most recently updated records and delete the rest.
    async fn cleanup_old_files(&self, keep_count: usize) -> Result<CleanupReport> {
        let files = self.list().await?;
        let mut deleted_count = 0;
        let mut freed_bytes = 0;
        for stale in files.iter().skip(keep_count) {
            if self.delete(&stale.name).await? {
                deleted_count += 1;
                freed_bytes += stale.size_bytes;
            }
        }

        let message = if deleted_count == 0 {
            "No old files to clean up".to_string()
        } else {
            format!(
                "Deleted {deleted_count} old file(s), freed {}",
                format_file_size(freed_bytes)
            )
        };
        tracing::info!(deleted_count, keep_count, "Cleaned up media store");
        Ok(CleanupReport {
            deleted_count,
            message,
        })
    }

    /// Store the background image for `appearance`.
    async fn save_image(&self, appearance: Appearance, data: MediaData) -> Result<PutOutcome> {
        let slot = appearance.image_slot();
        let (bytes, mime_type) = data.into_parts()?;
        let mime_type = mime_type.unwrap_or_else(|| slot.fallback_mime_type().to_string());
        self.put(slot.name(), bytes, Some(&mime_type), None).await
    }

    async fn get_image(
        &self,
        appearance: Appearance,
        registry: &ObjectUrlRegistry,
    ) -> Result<Option<SlotHandle>> {
        slot_handle(self, appearance.image_slot(), registry).await
    }

    /// Store the background video.
    async fn save_video(&self, data: MediaData) -> Result<PutOutcome> {
        let (bytes, mime_type) = data.into_parts()?;
        let mime_type = mime_type.unwrap_or_else(|| MediaSlot::Video.fallback_mime_type().to_string());
        self.put(MediaSlot::Video.name(), bytes, Some(&mime_type), None)
            .await
    }

    async fn get_video(&self, registry: &ObjectUrlRegistry) -> Result<Option<SlotHandle>> {
        slot_handle(self, MediaSlot::Video, registry).await
    }
}

async fn slot_handle<M: MediaStore + ?Sized>(
    store: &M,
    slot: MediaSlot,
    registry: &ObjectUrlRegistry,
) -> Result<Option<SlotHandle>> {
    Ok(store.get(slot.name()).await?.map(|record| SlotHandle {
        url: registry.resolve(&record),
        mime_type: record.mime_type,
        last_updated: record.last_updated_at,
    }))
}

#[allow(clippy::cast_precision_loss)]
fn usage_percent(used: u64, quota: u64) -> f64 {
    if quota == 0 {
        return 100.0;
    }
    (used as f64 / quota as f64) * 100.0
}

/// libSQL implementation of `MediaStore` over the `media_files` table
pub struct LibSqlMediaStore<'a> {
    conn: &'a Connection,
    quota_bytes: Option<u64>,
    warn_ratio: f64,
}

impl<'a> LibSqlMediaStore<'a> {
    /// Create a store without a quota
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            quota_bytes: None,
            warn_ratio: DEFAULT_QUOTA_WARN_RATIO,
        }
    }

    /// Create a store using the quota settings of `config`
    pub const fn with_config(conn: &'a Connection, config: &StorageConfig) -> Self {
        Self {
            conn,
            quota_bytes: config.media_quota_bytes,
            warn_ratio: config.quota_warn_ratio,
        }
    }

    async fn size_of(&self, name: &str) -> Result<u64> {
        Ok(self.info(name).await?.map_or(0, |info| info.size_bytes))
    }

    async fn total_size(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COALESCE(SUM(size_bytes), 0) FROM media_files", ())
            .await?;
        let used: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(used).unwrap_or_default())
    }

    /// Check the projected usage of replacing `name` with `size_bytes`.
    async fn check_quota(&self, name: &str, size_bytes: u64) -> Result<Option<QuotaWarning>> {
        let Some(quota_bytes) = self.quota_bytes else {
            return Ok(None);
        };

        let existing_bytes = self.size_of(name).await?;
        let projected_bytes = self.total_size().await?.saturating_sub(existing_bytes) + size_bytes;
        if projected_bytes > quota_bytes {
            return Err(Error::QuotaExceeded {
                store: STORE_LABEL,
                requested_bytes: size_bytes,
                quota_bytes,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let over_ratio = projected_bytes as f64 > quota_bytes as f64 * self.warn_ratio;
        if !over_ratio {
            return Ok(None);
        }

        let warning = QuotaWarning {
            projected_bytes,
            quota_bytes,
            usage_percent: usage_percent(projected_bytes, quota_bytes),
        };
        tracing::warn!(
            slot = name,
            bytes = size_bytes,
            usage_percent = warning.usage_percent,
            "Media storage is nearly full"
        );
        Ok(Some(warning))
    }
}

fn map_write_error(error: libsql::Error, requested_bytes: u64, quota_bytes: Option<u64>) -> Error {
    match error {
        libsql::Error::SqliteFailure(SQLITE_FULL, _) => Error::QuotaExceeded {
            store: STORE_LABEL,
            requested_bytes,
            quota_bytes: quota_bytes.unwrap_or_default(),
        },
        other => other.into(),
    }
}

fn row_to_info(row: &libsql::Row) -> Result<MediaFileInfo> {
    Ok(MediaFileInfo {
        name: row.get(0)?,
        size_bytes: u64::try_from(row.get::<i64>(1)?).unwrap_or_default(),
        mime_type: row.get(2)?,
        created_at: row.get(3)?,
        last_updated_at: row.get(4)?,
    })
}

impl MediaStore for LibSqlMediaStore<'_> {
    async fn put(
        &self,
        name: &str,
        blob: Vec<u8>,
        mime_type: Option<&str>,
        size_bytes: Option<u64>,
    ) -> Result<PutOutcome> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("Media name must not be empty".into()));
        }
        let size_bytes = size_bytes.unwrap_or(blob.len() as u64);
        let mime_type = mime_type
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();

        let quota_warning = self.check_quota(name, size_bytes).await?;

        let now = unix_timestamp_millis_now();
        // Single upsert so readers never observe a half-written record.
        self.conn
            .execute(
                "INSERT INTO media_files (name, blob, mime_type, size_bytes, created_at, last_updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(name) DO UPDATE SET
                    blob = excluded.blob,
                    mime_type = excluded.mime_type,
                    size_bytes = excluded.size_bytes,
                    last_updated_at = MAX(excluded.last_updated_at, media_files.last_updated_at + 1)",
                libsql::params![name, blob, mime_type.as_str(), size_bytes as i64, now, now],
            )
            .await
            .map_err(|error| map_write_error(error, size_bytes, self.quota_bytes))?;

        let file = self
            .info(name)
            .await?
            .ok_or_else(|| Error::Storage(format!("Record {name} vanished after write")))?;
        tracing::debug!(slot = name, bytes = size_bytes, "Stored media record");
        Ok(PutOutcome {
            file,
            quota_warning,
        })
    }

    async fn get(&self, name: &str) -> Result<Option<MediaRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, blob, mime_type, size_bytes, created_at, last_updated_at
                 FROM media_files WHERE name = ?",
                [name],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(MediaRecord {
            name: row.get(0)?,
            blob: row.get(1)?,
            mime_type: row.get(2)?,
            size_bytes: u64::try_from(row.get::<i64>(3)?).unwrap_or_default(),
            created_at: row.get(4)?,
            last_updated_at: row.get(5)?,
        }))
    }

    async fn info(&self, name: &str) -> Result<Option<MediaFileInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, size_bytes, mime_type, created_at, last_updated_at
                 FROM media_files WHERE name = ?",
                [name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_info(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM media_files WHERE name = ?", [name])
            .await?;
        Ok(deleted > 0)
    }

    async fn clear_all(&self) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM media_files", ()).await?;
        tracing::info!(deleted, "Cleared media store");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MediaFileInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, size_bytes, mime_type, created_at, last_updated_at
                 FROM media_files ORDER BY last_updated_at DESC, name",
                (),
            )
            .await?;

        let mut files = Vec::new();
        while let Some(row) = rows.next().await? {
            files.push(row_to_info(&row)?);
        }
        Ok(files)
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::media::encode_data_url;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn quota_config(quota: u64) -> StorageConfig {
        StorageConfig {
            media_quota_bytes: Some(quota),
            ..StorageConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_then_get_returns_record() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());

        let outcome = store
            .put("image_light", vec![1, 2, 3], Some("image/png"), None)
            .await
            .unwrap();
        assert_eq!(outcome.file.size_bytes, 3);
        assert_eq!(outcome.quota_warning, None);

        let record = store.get("image_light").await.unwrap().unwrap();
        assert_eq!(record.blob, vec![1, 2, 3]);
        assert_eq!(record.mime_type, "image/png");
        assert!(store.get("image_dark").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overwrite_keeps_created_at_and_bumps_updated_at() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());

        let first = store.put("video_main", vec![1], None, None).await.unwrap();
        let second = store
            .put("video_main", vec![2, 2], Some("video/webm"), None)
            .await
            .unwrap();

        assert_eq!(second.file.created_at, first.file.created_at);
        assert!(second.file.last_updated_at > first.file.last_updated_at);
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(first.file.mime_type, FALLBACK_MIME_TYPE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn warning_ratio_does_not_block_write() {
        let db = setup().await;
        let config = quota_config(100);
        let store = LibSqlMediaStore::with_config(db.connection(), &config);

        let outcome = store
            .put("image_light", vec![0; 85], Some("image/png"), None)
            .await
            .unwrap();
        let warning = outcome.quota_warning.unwrap();
        assert_eq!(warning.projected_bytes, 85);
        assert!(store.get("image_light").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_over_quota_is_rejected() {
        let db = setup().await;
        let config = quota_config(100);
        let store = LibSqlMediaStore::with_config(db.connection(), &config);

        store.put("image_light", vec![0; 60], None, None).await.unwrap();
        let error = store
            .put("image_dark", vec![0; 60], None, None)
            .await
            .unwrap_err();
        assert!(error.is_quota_exceeded());
        assert!(store.get("image_dark").await.unwrap().is_none());

        // Replacing the same slot only counts the difference.
        store.put("image_light", vec![0; 90], None, None).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cleanup_keeps_most_recent_records() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());
        for (index, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store.put(name, vec![0; 10], None, None).await.unwrap();
            db.connection()
                .execute(
                    "UPDATE media_files SET last_updated_at = ? WHERE name = ?",
                    libsql::params![index as i64 + 1, *name],
                )
                .await
                .unwrap();
        }

        let report = store.cleanup_old_files(2).await.unwrap();
        assert_eq!(report.deleted_count, 3);
        let remaining: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|file| file.name)
            .collect();
        assert_eq!(remaining, vec!["e", "d"]);

        let report = store.cleanup_old_files(5).await.unwrap();
        assert_eq!(report.deleted_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_info_reports_quota_only_when_known() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());
        store.put("image_light", vec![0; 10], None, None).await.unwrap();

        let info = store.storage_info().await.unwrap();
        assert_eq!(info.total_size_bytes, 10);
        assert_eq!(info.record_count, 1);
        assert_eq!(info.quota_total_bytes, None);
        assert_eq!(info.usage_percent, None);

        let config = quota_config(40);
        let limited = LibSqlMediaStore::with_config(db.connection(), &config);
        let info = limited.storage_info().await.unwrap();
        assert_eq!(info.quota_total_bytes, Some(40));
        assert_eq!(info.usage_percent, Some(25.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn theme_helpers_use_slot_names() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());
        let registry = ObjectUrlRegistry::new();

        store
            .save_image(
                Appearance::Dark,
                MediaData::DataUrl(encode_data_url(&[7, 7], "image/webp")),
            )
            .await
            .unwrap();
        store.save_video(MediaData::from(vec![1, 2, 3])).await.unwrap();

        assert!(store.get_image(Appearance::Light, &registry).await.unwrap().is_none());
        let dark = store.get_image(Appearance::Dark, &registry).await.unwrap().unwrap();
        assert_eq!(dark.mime_type, "image/webp");
        assert_eq!(registry.dereference(&dark.url).unwrap().name, "image_dark");

        let video = store.get_video(&registry).await.unwrap().unwrap();
        assert_eq!(video.mime_type, "video/mp4");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_and_clear() {
        let db = setup().await;
        let store = LibSqlMediaStore::new(db.connection());
        store.put("image_light", vec![1], None, None).await.unwrap();
        store.put("image_dark", vec![1], None, None).await.unwrap();

        assert!(store.delete("image_light").await.unwrap());
        assert!(!store.delete("image_light").await.unwrap());
        store.clear_all().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
