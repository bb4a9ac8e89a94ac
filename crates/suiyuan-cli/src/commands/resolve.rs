use std::path::Path;

use suiyuan_core::background::{BackgroundPayload, BackgroundResolver, BackgroundSource};
use suiyuan_core::models::{Appearance, BackgroundKind};

use crate::commands::common::Stores;
use crate::error::CliError;

pub async fn resolve_background(
    kind: Option<BackgroundKind>,
    appearance: Appearance,
    data_dir: &Path,
) -> Result<BackgroundSource, CliError> {
    let stores = Stores::open(data_dir).await?;
    let (sync_kv, local_kv, media) = (stores.sync_kv(), stores.local_kv(), stores.media());
    let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &stores.config)
        .with_bundled(stores.bundled().await?);

    let settings = resolver.load().await?;
    let kind = kind.unwrap_or(settings.background);
    Ok(resolver
        .resolve_background_source(&settings, kind, appearance)
        .await?)
}

pub async fn run_resolve(
    kind: Option<BackgroundKind>,
    appearance: Appearance,
    data_dir: &Path,
) -> Result<(), CliError> {
    let source = resolve_background(kind, appearance, data_dir).await?;
    println!("{}", serde_json::to_string_pretty(&describe(&source))?);
    Ok(())
}

/// JSON view of a source; media payloads are summarized rather than dumped.
pub fn describe(source: &BackgroundSource) -> serde_json::Value {
    match &source.payload {
        BackgroundPayload::Media {
            url,
            mime_type,
            opacity,
            blur,
        } => serde_json::json!({
            "kind": source.kind,
            "payload": {
                "type": "media",
                "url": summarize_url(url),
                "mimeType": mime_type,
                "opacity": opacity,
                "blur": blur,
            },
        }),
        _ => serde_json::to_value(source).unwrap_or_default(),
    }
}

fn summarize_url(url: &str) -> String {
    const MAX_LEN: usize = 64;
    if url.len() <= MAX_LEN {
        return url.to_string();
    }
    let head: String = url.chars().take(MAX_LEN).collect();
    format!("{head}... ({} chars)", url.len())
}
