//! libSQL databases behind the settings, metadata, and blob stores

use std::path::Path;
use std::time::Duration;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::Result;
use crate::util::normalize_text_option;

const ENV_REMOTE_URL: &str = "TURSO_DATABASE_URL";
const ENV_REMOTE_TOKEN: &str = "TURSO_AUTH_TOKEN";
const REPLICA_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Turso remote backing the cross-device copy of `sync.db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub url: String,
    pub auth_token: String,
}

impl SyncConfig {
    /// Read the remote URL and token through `lookup`.
    ///
    /// `None` unless both are set and non-blank.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Some(Self {
            url: normalize_text_option(lookup(ENV_REMOTE_URL))?,
            auth_token: normalize_text_option(lookup(ENV_REMOTE_TOKEN))?,
        })
    }
}

/// One migrated libSQL database (`sync.db` or `local.db`).
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    replica: bool,
}

impl Database {
    /// Open or create a local database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path).build().await?;
        tracing::debug!(path = %path, "Opened local database");
        Self::prepare(db, false).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::prepare(db, false).await
    }

    /// Open `local_path` as an embedded replica of the Turso remote.
    ///
    /// The remote schema is pulled before migrating, so every device agrees
    /// on the schema version.
    pub async fn open_with_sync(local_path: impl AsRef<Path>, remote: SyncConfig) -> Result<Self> {
        let path = local_path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_remote_replica(&path, remote.url, remote.auth_token)
            .sync_interval(REPLICA_SYNC_INTERVAL)
            .build()
            .await?;
        db.sync().await?;
        tracing::debug!(path = %path, "Opened replica database");
        Self::prepare(db, true).await
    }

    async fn prepare(db: LibSqlDatabase, replica: bool) -> Result<Self> {
        let conn = db.connect()?;
        if !replica {
            // journal_mode answers with a row, so it goes through `query`.
            conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
            conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
        }
        migrations::run(&conn).await?;
        Ok(Self { db, conn, replica })
    }

    /// Pull remote changes; local databases have nothing to pull.
    pub async fn sync(&self) -> Result<()> {
        if self.replica {
            self.db.sync().await?;
            tracing::debug!("Pulled remote settings");
        }
        Ok(())
    }

    pub const fn is_sync_enabled(&self) -> bool {
        self.replica
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
