use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] suiyuan_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),
    #[error("Nothing stored in slot {0}")]
    EmptySlot(String),
    #[error(
        "Sync is not configured. Set TURSO_DATABASE_URL and TURSO_AUTH_TOKEN to share settings across devices."
    )]
    SyncNotConfigured,
}
