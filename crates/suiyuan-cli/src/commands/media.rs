use std::path::Path;

use suiyuan_core::media::MediaData;
use suiyuan_core::models::{Appearance, MediaFileInfo};
use suiyuan_core::storage::{MediaMetadata, MediaMetadataStore, MediaStore, PutOutcome};
use suiyuan_core::util::format_file_size;
use suiyuan_core::MediaSlot;

use crate::commands::common::{guess_mime_type, Stores};
use crate::error::CliError;

pub async fn put_file(
    slot: MediaSlot,
    file: &Path,
    mime_type: Option<&str>,
    data_dir: &Path,
) -> Result<PutOutcome, CliError> {
    let bytes = tokio::fs::read(file).await?;
    let mime_type = mime_type
        .map(str::to_string)
        .or_else(|| guess_mime_type(file).map(str::to_string));
    let data = MediaData::Bytes { bytes, mime_type };

    let stores = Stores::open(data_dir).await?;
    let media = stores.media();
    let outcome = match slot {
        MediaSlot::ImageLight => media.save_image(Appearance::Light, data).await?,
        MediaSlot::ImageDark => media.save_image(Appearance::Dark, data).await?,
        MediaSlot::Video => media.save_video(data).await?,
    };
    Ok(outcome)
}

pub async fn run_put(
    slot: MediaSlot,
    file: &Path,
    mime_type: Option<&str>,
    data_dir: &Path,
) -> Result<(), CliError> {
    let outcome = put_file(slot, file, mime_type, data_dir).await?;
    if let Some(warning) = &outcome.quota_warning {
        eprintln!(
            "Warning: media storage at {:.1}% of {}",
            warning.usage_percent,
            format_file_size(warning.quota_bytes)
        );
    }
    println!(
        "{} {} ({})",
        outcome.file.name,
        format_file_size(outcome.file.size_bytes),
        outcome.file.mime_type
    );
    Ok(())
}

pub async fn run_get(slot: MediaSlot, output: Option<&Path>, data_dir: &Path) -> Result<(), CliError> {
    let stores = Stores::open(data_dir).await?;
    let media = stores.media();

    if let Some(path) = output {
        let record = media
            .get(slot.name())
            .await?
            .ok_or_else(|| CliError::EmptySlot(slot.to_string()))?;
        tokio::fs::write(path, &record.blob).await?;
        println!("{}", path.display());
        return Ok(());
    }

    let info: MediaFileInfo = media
        .info(slot.name())
        .await?
        .ok_or_else(|| CliError::EmptySlot(slot.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Delete the blob for `slot` and forget its device-local metadata.
pub async fn delete_slot(slot: MediaSlot, data_dir: &Path) -> Result<bool, CliError> {
    let stores = Stores::open(data_dir).await?;
    let deleted = stores.media().delete(slot.name()).await?;

    let local_kv = stores.local_kv();
    let metadata_store = MediaMetadataStore::new(&local_kv);
    let mut metadata = metadata_store.load().await?;
    if metadata.take(slot).is_some() {
        metadata_store.save(&metadata).await?;
    }
    Ok(deleted)
}

pub async fn run_delete(slot: MediaSlot, data_dir: &Path) -> Result<(), CliError> {
    if !delete_slot(slot, data_dir).await? {
        return Err(CliError::EmptySlot(slot.to_string()));
    }
    println!("{slot}");
    Ok(())
}

pub async fn run_clear(data_dir: &Path) -> Result<(), CliError> {
    let stores = Stores::open(data_dir).await?;
    stores.media().clear_all().await?;

    let local_kv = stores.local_kv();
    MediaMetadataStore::new(&local_kv)
        .save(&MediaMetadata::default())
        .await?;
    println!("Cleared all stored media");
    Ok(())
}
