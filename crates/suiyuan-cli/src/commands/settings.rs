use std::io::Read;
use std::path::Path;

use suiyuan_core::background::{BackgroundResolver, SaveOutcome};
use suiyuan_core::storage::settings_from_input;
use suiyuan_core::SettingsRecord;

use crate::commands::common::Stores;
use crate::error::CliError;

pub async fn load_settings(data_dir: &Path) -> Result<SettingsRecord, CliError> {
    let stores = Stores::open(data_dir).await?;
    let (sync_kv, local_kv, media) = (stores.sync_kv(), stores.local_kv(), stores.media());
    let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &stores.config)
        .with_bundled(stores.bundled().await?);
    Ok(resolver.load().await?)
}

pub async fn run_settings(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let settings = load_settings(data_dir).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    for line in format_settings_lines(&settings) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_settings_lines(settings: &SettingsRecord) -> Vec<String> {
    let mut lines = vec![
        format!("search engine: {}", settings.search_engine),
        format!("theme: {}", enum_label(&settings.theme)),
        format!("background: {}", enum_label(&settings.background)),
        format!("custom engines: {}", settings.custom_engines.len()),
    ];
    for slot in suiyuan_core::MediaSlot::ALL {
        let state = match settings.slot(slot) {
            Some(descriptor) if descriptor.is_temp() => "temp",
            Some(_) => "set",
            None => "empty",
        };
        lines.push(format!("{}: {state}", slot.field()));
    }
    lines
}

/// Save the settings JSON at `file` (`-` reads stdin).
pub async fn save_settings_file(file: &Path, data_dir: &Path) -> Result<SaveOutcome, CliError> {
    let raw = if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        tokio::fs::read_to_string(file).await?
    };
    // Checked before the stores are opened.
    let settings = settings_from_input(serde_json::from_str(&raw)?)?;

    let stores = Stores::open(data_dir).await?;
    let (sync_kv, local_kv, media) = (stores.sync_kv(), stores.local_kv(), stores.media());
    let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &stores.config);
    Ok(resolver.save_settings(settings).await?)
}

pub async fn run_save(file: &Path, data_dir: &Path) -> Result<(), CliError> {
    let outcome = save_settings_file(file, data_dir).await?;
    for warning in &outcome.quota_warnings {
        eprintln!(
            "Warning: media storage at {:.1}% after save",
            warning.usage_percent
        );
    }
    if outcome.temp_video_quota_exceeded {
        eprintln!("Warning: media storage is full, the preview video was discarded");
    } else if outcome.discarded_temp_video {
        eprintln!("Warning: the preview video could not be stored and was discarded");
    }
    println!("Settings saved");
    Ok(())
}

fn enum_label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}
