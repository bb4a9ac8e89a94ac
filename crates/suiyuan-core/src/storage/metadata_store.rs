//! Device-local media metadata (`suiYuanMedia`) and legacy entries

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::kv_store::KeyValueStore;
use crate::error::Result;
use crate::models::{MediaDescriptor, MediaSlot, SettingsRecord};

/// Key of the media metadata map in the device-local store
pub const MEDIA_METADATA_KEY: &str = "suiYuanMedia";
/// Prefix of legacy path-keyed file entries
pub const LEGACY_FILE_PREFIX: &str = "userimg_";
/// Legacy keys written before the metadata map existed
pub const LEGACY_KEYS: [&str; 3] = ["backgroundImage_light", "backgroundImage_dark", "backgroundVideo"];

/// Lightweight descriptors per slot; never carries binary content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_light: Option<MediaDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dark: Option<MediaDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaDescriptor>,
}

impl MediaMetadata {
    /// Metadata copies of the descriptors in `settings`.
    ///
    /// Temp videos are session-only and are not recorded.
    pub fn from_settings(settings: &SettingsRecord) -> Self {
        let pick = |slot: MediaSlot| {
            settings
                .slot(slot)
                .filter(|descriptor| !descriptor.is_temp())
                .and_then(MediaDescriptor::to_metadata)
        };
        Self {
            image_light: pick(MediaSlot::ImageLight),
            image_dark: pick(MediaSlot::ImageDark),
            video: pick(MediaSlot::Video),
        }
    }

    pub const fn slot(&self, slot: MediaSlot) -> Option<&MediaDescriptor> {
        match slot {
            MediaSlot::ImageLight => self.image_light.as_ref(),
            MediaSlot::ImageDark => self.image_dark.as_ref(),
            MediaSlot::Video => self.video.as_ref(),
        }
    }

    pub fn take(&mut self, slot: MediaSlot) -> Option<MediaDescriptor> {
        match slot {
            MediaSlot::ImageLight => self.image_light.take(),
            MediaSlot::ImageDark => self.image_dark.take(),
            MediaSlot::Video => self.video.take(),
        }
    }

    /// Parse each slot independently so one bad entry does not hide the others.
    fn from_map(map: &Map<String, Value>) -> Self {
        let parse = |slot: MediaSlot| {
            let value = map.get(slot.field()).filter(|value| !value.is_null())?;
            match serde_json::from_value::<MediaDescriptor>(value.clone()) {
                Ok(descriptor) => Some(descriptor),
                Err(error) => {
                    tracing::warn!(slot = %slot, %error, "Ignoring unreadable media metadata");
                    None
                }
            }
        };
        Self {
            image_light: parse(MediaSlot::ImageLight),
            image_dark: parse(MediaSlot::ImageDark),
            video: parse(MediaSlot::Video),
        }
    }
}

/// Access to the device-local metadata map and the legacy entries around it.
pub struct MediaMetadataStore<'a, S> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore> MediaMetadataStore<'a, S> {
    pub const fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> Result<MediaMetadata> {
        match self.kv.get_value(MEDIA_METADATA_KEY).await? {
            Some(Value::Object(map)) => Ok(MediaMetadata::from_map(&map)),
            Some(_) => {
                tracing::warn!(key = MEDIA_METADATA_KEY, "Media metadata is not an object");
                Ok(MediaMetadata::default())
            }
            None => Ok(MediaMetadata::default()),
        }
    }

    /// Purge legacy entries, then write `metadata`.
    pub async fn save(&self, metadata: &MediaMetadata) -> Result<()> {
        self.purge_legacy_keys().await?;
        self.kv
            .set_value(MEDIA_METADATA_KEY, &serde_json::to_value(metadata)?)
            .await
    }

    /// Delete `userimg_*` and the pre-metadata background keys.
    pub async fn purge_legacy_keys(&self) -> Result<usize> {
        let legacy: Vec<String> = self
            .kv
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(LEGACY_FILE_PREFIX) || LEGACY_KEYS.contains(&key.as_str()))
            .collect();
        if legacy.is_empty() {
            return Ok(0);
        }

        let keys: Vec<&str> = legacy.iter().map(String::as_str).collect();
        self.kv.remove(&keys).await?;
        tracing::info!(count = keys.len(), "Purged legacy media entries");
        Ok(keys.len())
    }

    /// Erase a video entry written before the temp marker existed.
    ///
    /// Only the `video` entry of the metadata map is rewritten. Returns whether
    /// anything was erased.
    pub async fn erase_unmarked_video(&self) -> Result<bool> {
        let Some(Value::Object(mut map)) = self.kv.get_value(MEDIA_METADATA_KEY).await? else {
            return Ok(false);
        };

        let unmarked = match map.get(MediaSlot::Video.field()) {
            None | Some(Value::Null) => false,
            Some(Value::String(value)) if value.is_empty() => false,
            Some(video) => match MediaDescriptor::deserialize(video) {
                Ok(descriptor) => descriptor.lacks_temp_marker(),
                Err(error) => {
                    tracing::debug!(%error, "Leaving undecodable video entry in place");
                    false
                }
            },
        };
        if !unmarked {
            return Ok(false);
        }

        map.insert(MediaSlot::Video.field().to_string(), Value::Null);
        self.kv
            .set_value(MEDIA_METADATA_KEY, &Value::Object(map))
            .await?;
        tracing::info!(key = MEDIA_METADATA_KEY, "Erased legacy video entry without temp marker");
        Ok(true)
    }

    /// `fileData` of the legacy `userimg_<file_name>` entry.
    pub async fn legacy_file_data(&self, file_name: &str) -> Result<Option<String>> {
        let key = format!("{LEGACY_FILE_PREFIX}{file_name}");
        Ok(match self.kv.get_value(&key).await? {
            Some(Value::Object(entry)) => entry
                .get("fileData")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            Some(Value::String(data)) => Some(data),
            _ => None,
        })
    }
}
