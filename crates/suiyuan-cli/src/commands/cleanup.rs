use std::path::Path;

use suiyuan_core::storage::{CleanupReport, MediaStore};

use crate::commands::common::Stores;
use crate::error::CliError;

pub async fn cleanup(keep: Option<usize>, data_dir: &Path) -> Result<CleanupReport, CliError> {
    let stores = Stores::open(data_dir).await?;
    let keep_count = keep.unwrap_or(stores.config.cleanup_keep_count);
    Ok(stores.media().cleanup_old_files(keep_count).await?)
}

pub async fn run_cleanup(keep: Option<usize>, data_dir: &Path) -> Result<(), CliError> {
    let report = cleanup(keep, data_dir).await?;
    println!("{}", report.message);
    Ok(())
}
