use std::path::Path;
use std::time::Duration;

use suiyuan_core::propagation::{ChangeFeed, PollingWatcher};

use crate::commands::common::Stores;
use crate::error::CliError;

pub async fn run_sync(data_dir: &Path) -> Result<(), CliError> {
    let stores = Stores::open(data_dir).await?;
    if !stores.sync.is_sync_enabled() {
        return Err(CliError::SyncNotConfigured);
    }

    stores.sync.sync().await?;
    println!("Sync completed");
    Ok(())
}

pub async fn run_watch(interval_ms: u64, data_dir: &Path) -> Result<(), CliError> {
    let stores = Stores::open(data_dir).await?;
    let sync_kv = stores.sync_kv();
    let period = Duration::from_millis(interval_ms.max(100));
    let mut watcher = PollingWatcher::new(&sync_kv, period).await?;
    tracing::info!(interval_ms = period.as_millis(), "Watching settings");

    loop {
        tokio::select! {
            changed = watcher.next_change() => {
                let Some(settings) = changed else { return Ok(()) };
                println!("{}", serde_json::to_string(&settings)?);
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
