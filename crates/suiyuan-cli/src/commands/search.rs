use std::path::Path;

use suiyuan_core::search::target_url;

use crate::commands::common::Stores;
use crate::error::CliError;

/// Search URL for `query` on `engine`, honoring saved custom engines.
pub async fn search_url(engine: &str, query: &[String], data_dir: &Path) -> Result<String, CliError> {
    let stores = Stores::open(data_dir).await?;
    let sync_kv = stores.sync_kv();
    let settings = suiyuan_core::storage::SettingsStore::new(&sync_kv, stores.config.settings_max_bytes)
        .load()
        .await?;
    Ok(target_url(&settings, engine, &query.join(" "))?)
}

pub async fn run_search(engine: &str, query: &[String], data_dir: &Path) -> Result<(), CliError> {
    println!("{}", search_url(engine, query, data_dir).await?);
    Ok(())
}
