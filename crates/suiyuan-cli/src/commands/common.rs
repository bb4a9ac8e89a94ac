use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use suiyuan_core::config::StorageConfig;
use suiyuan_core::db::{Database, SyncConfig};
use suiyuan_core::models::BackgroundConfig;
use suiyuan_core::storage::{LibSqlKeyValueStore, LibSqlMediaStore};

use crate::error::CliError;

/// Both databases of one installation plus the configuration they were opened with.
pub struct Stores {
    pub sync: Database,
    pub local: Database,
    pub config: StorageConfig,
}

impl Stores {
    /// Open (and migrate) the databases under `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self, CliError> {
        let mut config = StorageConfig::from_env()?;
        config.data_dir = Some(data_dir.to_path_buf());
        let sync_path = config.sync_db_path(data_dir.to_path_buf());
        let local_path = config.local_db_path(data_dir.to_path_buf());

        let sync = open_database(&sync_path, sync_config_from_env()).await?;
        let local = open_database(&local_path, None).await?;
        Ok(Self {
            sync,
            local,
            config,
        })
    }

    /// Cross-device settings store.
    pub fn sync_kv(&self) -> LibSqlKeyValueStore<'_> {
        LibSqlKeyValueStore::new(self.sync.connection(), "sync")
            .with_quota(self.config.sync_quota_bytes)
    }

    /// Device-local metadata store.
    pub fn local_kv(&self) -> LibSqlKeyValueStore<'_> {
        LibSqlKeyValueStore::new(self.local.connection(), "local")
    }

    pub fn media(&self) -> LibSqlMediaStore<'_> {
        LibSqlMediaStore::with_config(self.local.connection(), &self.config)
    }

    /// Bundled default-config document, if one is configured and present.
    pub async fn bundled(&self) -> Result<Option<BackgroundConfig>, CliError> {
        match &self.config.default_config_path {
            Some(path) => Ok(BackgroundConfig::load(path).await?),
            None => Ok(None),
        }
    }
}

/// `--data-dir`, then `SUIYUAN_DATA_DIR`, then the platform data directory.
pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| std::env::var_os("SUIYUAN_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("suiyuan")
}

fn sync_config_from_env() -> Option<SyncConfig> {
    SyncConfig::from_lookup(|key| std::env::var(key).ok())
}

async fn open_database(path: &Path, sync_config: Option<SyncConfig>) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if let Some(sync_config) = sync_config {
        tracing::info!("Settings sync enabled with Turso");
        let path_buf = path.to_path_buf();
        let db = std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .map_err(|error| suiyuan_core::Error::Database(error.to_string()))?;
                runtime.block_on(Database::open_with_sync(&path_buf, sync_config))
            })
            .map_err(|error| CliError::DatabaseInit(error.to_string()))?
            .join()
            .map_err(|_| CliError::DatabaseInit("sync initialization thread panicked".into()))??;

        Ok(db)
    } else {
        Ok(Database::open(path).await?)
    }
}

/// MIME type for a media file, from its extension.
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogv" | "ogg" => "video/ogg",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

/// Millisecond timestamp as a UTC label.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
