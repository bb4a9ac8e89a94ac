//! Bundled default-config document

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::media::{MediaDescriptor, MediaSlot, MediaSource};
use super::settings::BackgroundKind;
use crate::error::Result;

/// `{ "background": { ... } }` shipped next to the start page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    pub background: BundledBackground,
}

/// Background entry of the default-config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledBackground {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl BackgroundConfig {
    /// Parse a default-config document.
    pub fn parse(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Read the document from disk; a missing file is `Ok(None)`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(payload) => Self::parse(&payload).map(Some),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Write the document as pretty JSON.
    pub async fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path.as_ref(), payload).await?;
        Ok(())
    }

    /// Descriptor this document supplies for `slot`, if any.
    ///
    /// Image documents cover both image slots; video documents cover the video
    /// slot. Bundled videos are always permanent.
    pub fn descriptor_for(&self, slot: MediaSlot) -> Option<MediaDescriptor> {
        let background = &self.background;
        let matches_slot = match background.kind {
            BackgroundKind::Image => !slot.is_video(),
            BackgroundKind::Video => slot.is_video(),
            BackgroundKind::Default | BackgroundKind::Solid | BackgroundKind::Gradient => false,
        };
        if !matches_slot {
            return None;
        }

        let data_url = background.data_url.clone().filter(|url| !url.is_empty());
        let mut descriptor = match (background.file_path.clone().filter(|path| !path.is_empty()), data_url) {
            (Some(file_path), data_url) => MediaDescriptor::file_path(file_path, data_url),
            (None, Some(data_url)) => MediaDescriptor::inline(data_url),
            (None, None) => return None,
        };

        descriptor.name.clone_from(&background.file_name);
        descriptor.saved_name.clone_from(&background.file_name);
        descriptor.original_name.clone_from(&background.file_name);
        descriptor.mime_type = Some(
            background
                .file_type
                .clone()
                .unwrap_or_else(|| slot.fallback_mime_type().to_string()),
        );
        if slot.is_video() {
            descriptor.temp = Some(false);
        }
        Some(descriptor)
    }

    /// Document describing `descriptor` as the bundled background.
    ///
    /// Temp videos are never exported.
    pub fn from_descriptor(
        kind: BackgroundKind,
        descriptor: &MediaDescriptor,
        data_url: Option<String>,
    ) -> Option<Self> {
        if descriptor.is_temp() {
            return None;
        }
        let file_path = match &descriptor.source {
            MediaSource::FilePath { file_path, .. } => Some(file_path.clone()),
            _ => None,
        };
        let data_url = data_url.or_else(|| descriptor.data_url().map(ToString::to_string));
        if file_path.is_none() && data_url.is_none() {
            return None;
        }

        Some(Self {
            background: BundledBackground {
                kind,
                data_url,
                file_path,
                file_name: descriptor
                    .original_name
                    .clone()
                    .or_else(|| descriptor.saved_name.clone()),
                file_type: descriptor.mime_type.clone(),
            },
        })
    }
}
