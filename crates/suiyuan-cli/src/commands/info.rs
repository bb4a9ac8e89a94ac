use std::path::Path;

use suiyuan_core::storage::{MediaStore, StorageInfo};
use suiyuan_core::util::format_file_size;

use crate::commands::common::{format_timestamp, Stores};
use crate::error::CliError;

pub async fn storage_info(data_dir: &Path) -> Result<StorageInfo, CliError> {
    let stores = Stores::open(data_dir).await?;
    Ok(stores.media().storage_info().await?)
}

pub async fn run_info(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let info = storage_info(data_dir).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    for line in format_info_lines(&info) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_info_lines(info: &StorageInfo) -> Vec<String> {
    let mut lines = Vec::with_capacity(info.files.len() + 1);
    let usage = match (info.quota_total_bytes, info.usage_percent) {
        (Some(quota), Some(percent)) => format!(
            "{} of {} ({percent:.1}%)",
            format_file_size(info.total_size_bytes),
            format_file_size(quota)
        ),
        _ => format_file_size(info.total_size_bytes),
    };
    lines.push(format!("{} record(s), {usage}", info.record_count));
    for file in &info.files {
        lines.push(format!(
            "  {:<12} {:>10}  {:<12} updated {}",
            file.name,
            format_file_size(file.size_bytes),
            file.mime_type,
            format_timestamp(file.last_updated_at)
        ));
    }
    lines
}
