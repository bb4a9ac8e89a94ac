use std::path::Path;

use suiyuan_core::background::BackgroundResolver;
use suiyuan_core::models::{Appearance, BackgroundConfig};

use crate::commands::common::Stores;
use crate::error::CliError;

pub async fn export_config(
    appearance: Appearance,
    data_dir: &Path,
) -> Result<Option<BackgroundConfig>, CliError> {
    let stores = Stores::open(data_dir).await?;
    let (sync_kv, local_kv, media) = (stores.sync_kv(), stores.local_kv(), stores.media());
    let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &stores.config)
        .with_bundled(stores.bundled().await?);

    let settings = resolver.load().await?;
    Ok(resolver.export_default_config(&settings, appearance).await?)
}

pub async fn run_export_config(
    appearance: Appearance,
    output_path: Option<&Path>,
    data_dir: &Path,
) -> Result<(), CliError> {
    let Some(config) = export_config(appearance, data_dir).await? else {
        println!("Nothing to export: the active background has no stored media");
        return Ok(());
    };

    if let Some(path) = output_path {
        config.write(path).await?;
        println!("{}", path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}
