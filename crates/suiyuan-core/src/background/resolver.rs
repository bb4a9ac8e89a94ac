//! Layered load, resolution, and save of background media.
//!
//! Precedence, highest first: blob store, device-local metadata, bundled
//! default-config document. A video that cannot be played from any of them
//! is never reported as the active background.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::media::{decode_data_url, encode_data_url, ObjectUrlRegistry};
use crate::models::{
    Appearance, BackgroundConfig, BackgroundKind, BundledBackground, MediaDescriptor, MediaRecord,
    MediaSlot, MediaSource, SettingsRecord,
};
use crate::propagation::SettingsBroadcaster;
use crate::storage::{
    validate_settings, KeyValueStore, MediaMetadata, MediaMetadataStore, MediaStore, QuotaWarning,
    SettingsStore,
};

use super::{BackgroundPayload, BackgroundSource, SaveOutcome};

/// A slot written during a save and the record it replaced.
type ReplacedBlob = (MediaSlot, Option<MediaRecord>);

/// Where the bytes of a slot were found.
#[derive(Debug)]
enum Located {
    /// Blob store record with this name
    Blob(String),
    /// Directly displayable URL (inline `data:` URL or legacy URL)
    Url(String),
}

/// Coordinates the settings, metadata, and blob stores for one start page.
pub struct BackgroundResolver<'a, S, L, M> {
    sync_kv: &'a S,
    local_kv: &'a L,
    media: &'a M,
    config: &'a StorageConfig,
    urls: ObjectUrlRegistry,
    bundled: Option<BackgroundConfig>,
    broadcaster: Option<SettingsBroadcaster>,
}

impl<'a, S, L, M> BackgroundResolver<'a, S, L, M>
where
    S: KeyValueStore,
    L: KeyValueStore,
    M: MediaStore,
{
    /// `sync_kv` holds the cross-device settings record; `local_kv` the
    /// device-local media metadata.
    pub fn new(sync_kv: &'a S, local_kv: &'a L, media: &'a M, config: &'a StorageConfig) -> Self {
        Self {
            sync_kv,
            local_kv,
            media,
            config,
            urls: ObjectUrlRegistry::new(),
            bundled: None,
            broadcaster: None,
        }
    }

    /// Use `bundled` as the last-resort source for empty slots.
    #[must_use]
    pub fn with_bundled(mut self, bundled: Option<BackgroundConfig>) -> Self {
        self.bundled = bundled;
        self
    }

    /// Share an object URL registry with other components.
    #[must_use]
    pub fn with_object_urls(mut self, urls: ObjectUrlRegistry) -> Self {
        self.urls = urls;
        self
    }

    /// Notify listeners of `broadcaster` after every save.
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: SettingsBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub const fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.urls
    }

    fn settings_store(&self) -> SettingsStore<'a, S> {
        SettingsStore::new(self.sync_kv, self.config.settings_max_bytes)
    }

    fn metadata_store(&self) -> MediaMetadataStore<'a, L> {
        MediaMetadataStore::new(self.local_kv)
    }

    /// Run one resolution pass and return the settings to display.
    pub async fn load(&self) -> Result<SettingsRecord> {
        let metadata_store = self.metadata_store();
        metadata_store.erase_unmarked_video().await?;

        let mut settings = self.settings_store().load().await?;

        let mut metadata = metadata_store.load().await?;
        for slot in MediaSlot::ALL {
            let current = settings.slot_mut(slot);
            if current.is_none() {
                *current = metadata.take(slot);
            }
        }

        let (light, dark, video) = tokio::join!(
            self.media.info(MediaSlot::ImageLight.name()),
            self.media.info(MediaSlot::ImageDark.name()),
            self.media.info(MediaSlot::Video.name()),
        );
        for (slot, found) in MediaSlot::ALL.into_iter().zip([light?, dark?, video?]) {
            let Some(info) = found else { continue };
            let previous = settings.slot_mut(slot).take();
            let mut stored = MediaDescriptor::stored(
                slot,
                info.mime_type,
                info.size_bytes,
                info.last_updated_at,
            );
            if let Some(previous) = previous {
                stored.name = previous.name;
                stored.original_name = previous.original_name;
            }
            *settings.slot_mut(slot) = Some(stored);
        }

        if let Some(bundled) = &self.bundled {
            for slot in MediaSlot::ALL {
                let current = settings.slot_mut(slot);
                if current.is_none() {
                    *current = bundled.descriptor_for(slot);
                }
            }
        }

        if settings.background == BackgroundKind::Video && !self.has_playable_video(&settings).await? {
            tracing::warn!("Video background has no playable source, falling back to default");
            settings.background = BackgroundKind::Default;
        }

        Ok(settings)
    }

    /// Displayable background for `kind` under `appearance`.
    pub async fn resolve_background_source(
        &self,
        settings: &SettingsRecord,
        kind: BackgroundKind,
        appearance: Appearance,
    ) -> Result<BackgroundSource> {
        let payload = match kind {
            BackgroundKind::Solid => BackgroundPayload::Solid {
                color: match appearance {
                    Appearance::Light => settings.solid_color.clone(),
                    Appearance::Dark => settings.solid_color_dark.clone(),
                },
            },
            BackgroundKind::Gradient => BackgroundPayload::Gradient {
                start: settings.gradient_start.clone(),
                end: settings.gradient_end.clone(),
                direction: settings.gradient_direction.clone(),
            },
            BackgroundKind::Image => {
                let slot = appearance.image_slot();
                let opacity = settings.image_opacity;
                let blur = settings.image_blur;
                match self.media_payload(settings.slot(slot), slot, opacity, blur).await? {
                    Some(payload) => payload,
                    None => return Ok(self.default_source(appearance)),
                }
            }
            BackgroundKind::Video => {
                let slot = MediaSlot::Video;
                let opacity = settings.video_opacity;
                let blur = settings.video_blur;
                match self.media_payload(settings.slot(slot), slot, opacity, blur).await? {
                    Some(payload) => payload,
                    None => {
                        tracing::warn!("Video background has no playable source, using default");
                        return Ok(self.default_source(appearance));
                    }
                }
            }
            BackgroundKind::Default => return Ok(self.default_source(appearance)),
        };
        Ok(BackgroundSource { kind, payload })
    }

    /// Validate, persist media, and write the settings record.
    ///
    /// Blob writes made before a failing step are rolled back, so a failed
    /// save leaves every store as it was.
    pub async fn save_settings(&self, settings: SettingsRecord) -> Result<SaveOutcome> {
        validate_settings(serde_json::to_value(&settings)?, self.config.settings_max_bytes)?;

        let mut replaced = Vec::new();
        match self.write_settings(settings, &mut replaced).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.restore_blobs(replaced).await;
                Err(error)
            }
        }
    }

    async fn write_settings(
        &self,
        mut settings: SettingsRecord,
        replaced: &mut Vec<ReplacedBlob>,
    ) -> Result<SaveOutcome> {
        let mut quota_warnings = Vec::new();
        let mut discarded_temp_video = false;
        let mut temp_video_quota_exceeded = false;

        if let Some(temp) = settings.video.clone().filter(MediaDescriptor::is_temp) {
            let promoted = match self.persist_slot(MediaSlot::Video, &temp, replaced).await {
                Ok(promoted) => promoted,
                Err(error) => {
                    tracing::warn!(slot = %MediaSlot::Video, %error, "Could not promote temporary video");
                    temp_video_quota_exceeded = error.is_quota_exceeded();
                    None
                }
            };
            if let Some((stored, warning)) = promoted {
                tracing::info!(slot = %MediaSlot::Video, "Promoted temporary video");
                settings.video = Some(stored);
                quota_warnings.extend(warning);
            } else {
                tracing::warn!(slot = %MediaSlot::Video, "Discarding temporary video");
                settings.video = None;
                discarded_temp_video = true;
                if settings.background == BackgroundKind::Video {
                    settings.background = BackgroundKind::Default;
                }
            }
        }

        for slot in MediaSlot::ALL {
            let Some(descriptor) = settings.slot(slot).cloned() else {
                continue;
            };
            if descriptor.is_temp() || descriptor.data_url().is_none() {
                continue;
            }
            match self.persist_slot(slot, &descriptor, replaced).await {
                Ok(Some((stored, warning))) => {
                    *settings.slot_mut(slot) = Some(stored);
                    quota_warnings.extend(warning);
                }
                Ok(None) => {}
                Err(Error::InvalidDataUrl(reason)) => {
                    tracing::warn!(slot = %slot, %reason, "Dropping unreadable inline media");
                    *settings.slot_mut(slot) = None;
                }
                Err(error) => return Err(error),
            }
        }

        self.metadata_store()
            .save(&MediaMetadata::from_settings(&settings))
            .await?;
        let saved = self.settings_store().save(&settings).await?;
        let notified = self
            .broadcaster
            .as_ref()
            .map_or(0, |broadcaster| broadcaster.broadcast(&saved));

        Ok(SaveOutcome {
            settings: saved,
            quota_warnings,
            discarded_temp_video,
            temp_video_quota_exceeded,
            notified,
        })
    }

    /// Put back the blobs a failed save overwrote, newest write first.
    async fn restore_blobs(&self, replaced: Vec<ReplacedBlob>) {
        for (slot, previous) in replaced.into_iter().rev() {
            let restored = match previous {
                Some(record) => self
                    .media
                    .put(
                        &record.name,
                        record.blob,
                        Some(&record.mime_type),
                        Some(record.size_bytes),
                    )
                    .await
                    .map(|_| ()),
                None => self.media.delete(slot.name()).await.map(|_| ()),
            };
            match restored {
                Ok(()) => tracing::info!(slot = %slot, "Rolled back blob of failed save"),
                Err(error) => {
                    tracing::warn!(slot = %slot, %error, "Could not roll back blob of failed save");
                }
            }
        }
    }

    /// Default-config document describing the current background.
    ///
    /// `None` when the active media slot is empty or holds a temp video.
    pub async fn export_default_config(
        &self,
        settings: &SettingsRecord,
        appearance: Appearance,
    ) -> Result<Option<BackgroundConfig>> {
        let kind = settings.background;
        let slot = match kind {
            BackgroundKind::Image => appearance.image_slot(),
            BackgroundKind::Video => MediaSlot::Video,
            BackgroundKind::Default | BackgroundKind::Solid | BackgroundKind::Gradient => {
                return Ok(Some(BackgroundConfig {
                    background: BundledBackground {
                        kind,
                        data_url: None,
                        file_path: None,
                        file_name: None,
                        file_type: None,
                    },
                }));
            }
        };

        let Some(descriptor) = settings.slot(slot) else {
            return Ok(None);
        };
        if descriptor.is_temp() {
            return Ok(None);
        }

        let data_url = match descriptor.data_url() {
            Some(data_url) => Some(data_url.to_string()),
            None => match self.locate(slot, Some(descriptor)).await? {
                Some(Located::Blob(name)) => self
                    .media
                    .get(&name)
                    .await?
                    .map(|record| encode_data_url(&record.blob, &record.mime_type)),
                Some(Located::Url(url)) if url.starts_with("data:") => Some(url),
                Some(Located::Url(_)) | None => None,
            },
        };
        Ok(BackgroundConfig::from_descriptor(kind, descriptor, data_url))
    }

    fn default_source(&self, appearance: Appearance) -> BackgroundSource {
        let image = match appearance {
            Appearance::Light => self.config.default_light_image.clone(),
            Appearance::Dark => self.config.default_dark_image.clone(),
        };
        BackgroundSource {
            kind: BackgroundKind::Default,
            payload: BackgroundPayload::Default { image },
        }
    }

    async fn has_playable_video(&self, settings: &SettingsRecord) -> Result<bool> {
        let Some(video) = settings.video.as_ref() else {
            return Ok(false);
        };
        if video.is_temp() {
            return Ok(false);
        }
        Ok(self.locate(MediaSlot::Video, Some(video)).await?.is_some())
    }

    async fn media_payload(
        &self,
        descriptor: Option<&MediaDescriptor>,
        slot: MediaSlot,
        opacity: u32,
        blur: u32,
    ) -> Result<Option<BackgroundPayload>> {
        let (url, mime_type) = match self.locate(slot, descriptor).await? {
            Some(Located::Blob(name)) => match self.media.get(&name).await? {
                Some(record) => (self.urls.resolve(&record), Some(record.mime_type)),
                None => return Ok(None),
            },
            Some(Located::Url(url)) => {
                let mime_type = descriptor
                    .and_then(|descriptor| descriptor.mime_type.clone())
                    .or_else(|| data_url_mime(&url));
                (url, mime_type)
            }
            None => return Ok(None),
        };
        Ok(Some(BackgroundPayload::Media {
            url,
            mime_type,
            opacity,
            blur,
        }))
    }

    /// Find the bytes for `slot` following the resolution order.
    async fn locate(
        &self,
        slot: MediaSlot,
        descriptor: Option<&MediaDescriptor>,
    ) -> Result<Option<Located>> {
        // A provisional video previews its own payload, not an older stored one.
        if !descriptor.is_some_and(MediaDescriptor::is_temp) {
            for name in blob_candidates(slot, descriptor) {
                if self.media.info(&name).await?.is_some() {
                    return Ok(Some(Located::Blob(name)));
                }
            }
        }

        let Some(descriptor) = descriptor else {
            return Ok(None);
        };
        if let Some(data_url) = descriptor.data_url() {
            return Ok(Some(Located::Url(data_url.to_string())));
        }

        match &descriptor.source {
            MediaSource::FilePath { file_path, .. } => {
                let metadata_store = self.metadata_store();
                for key in legacy_file_names(descriptor, file_path) {
                    if let Some(data) = metadata_store.legacy_file_data(&key).await? {
                        return Ok(Some(Located::Url(data)));
                    }
                }
                Ok(None)
            }
            MediaSource::Legacy { value } if !value.trim().is_empty() => {
                Ok(Some(Located::Url(value.clone())))
            }
            MediaSource::Blob | MediaSource::InlineData { .. } | MediaSource::Legacy { .. } => {
                Ok(None)
            }
        }
    }

    /// Write the inline payload of `descriptor` into `slot`.
    ///
    /// The record it replaces is pushed onto `replaced`. `Ok(None)` when the
    /// descriptor has no inline payload.
    async fn persist_slot(
        &self,
        slot: MediaSlot,
        descriptor: &MediaDescriptor,
        replaced: &mut Vec<ReplacedBlob>,
    ) -> Result<Option<(MediaDescriptor, Option<QuotaWarning>)>> {
        let Some(data_url) = descriptor.data_url() else {
            return Ok(None);
        };
        let (bytes, mime_type) = decode_data_url(data_url)?;
        let previous = self.media.get(slot.name()).await?;
        let outcome = self
            .media
            .put(slot.name(), bytes, Some(&mime_type), None)
            .await?;
        replaced.push((slot, previous));

        let mut stored = MediaDescriptor::stored(
            slot,
            outcome.file.mime_type,
            outcome.file.size_bytes,
            outcome.file.last_updated_at,
        );
        stored.name.clone_from(&descriptor.name);
        stored.original_name.clone_from(&descriptor.original_name);
        Ok(Some((stored, outcome.quota_warning)))
    }
}

/// Blob names to try: the descriptor's blob key, then the slot name.
fn blob_candidates(slot: MediaSlot, descriptor: Option<&MediaDescriptor>) -> Vec<String> {
    let first = descriptor.map_or_else(|| slot.name(), |descriptor| descriptor.blob_key(slot));
    let mut names = vec![first.to_string()];
    if first != slot.name() {
        names.push(slot.name().to_string());
    }
    names
}

/// Names a legacy `userimg_*` entry may have been stored under.
fn legacy_file_names(descriptor: &MediaDescriptor, file_path: &str) -> Vec<String> {
    let base_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let mut names: Vec<String> = Vec::new();
    for candidate in [
        descriptor.saved_name.as_deref(),
        descriptor.name.as_deref(),
        Some(file_path),
        Some(base_name),
    ]
    .into_iter()
    .flatten()
    {
        if !candidate.is_empty() && !names.iter().any(|name| name == candidate) {
            names.push(candidate.to_string());
        }
    }
    names
}

fn data_url_mime(url: &str) -> Option<String> {
    let rest = url.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    let mime = &rest[..end];
    (!mime.is_empty()).then(|| mime.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::Database;
    use crate::storage::{LibSqlKeyValueStore, LibSqlMediaStore, MEDIA_METADATA_KEY, SETTINGS_KEY};

    struct Fixture {
        sync: Database,
        local: Database,
        config: StorageConfig,
    }

    async fn fixture() -> Fixture {
        fixture_with(StorageConfig::default()).await
    }

    async fn fixture_with(config: StorageConfig) -> Fixture {
        Fixture {
            sync: Database::open_in_memory().await.unwrap(),
            local: Database::open_in_memory().await.unwrap(),
            config,
        }
    }

    fn png_data_url() -> String {
        encode_data_url(&[137, 80, 78, 71], "image/png")
    }

    fn mp4_data_url() -> String {
        encode_data_url(&[0, 0, 0, 24, 102, 116, 121, 112], "video/mp4")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unmarked_local_video_is_purged_and_background_downgraded() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        sync_kv
            .set_value(SETTINGS_KEY, &json!({"background": "video"}))
            .await
            .unwrap();
        local_kv
            .set_value(
                MEDIA_METADATA_KEY,
                &json!({"video": {"filePath": "userimg/old.mp4", "name": "old.mp4"}}),
            )
            .await
            .unwrap();

        let settings = resolver.load().await.unwrap();
        assert_eq!(settings.background, BackgroundKind::Default);
        assert_eq!(settings.video, None);
        let stored = local_kv.get_value(MEDIA_METADATA_KEY).await.unwrap().unwrap();
        assert_eq!(stored["video"], json!(null));

        for (appearance, image) in [(Appearance::Light, "img/light.jpg"), (Appearance::Dark, "img/dark.jpg")] {
            let source = resolver
                .resolve_background_source(&settings, BackgroundKind::Video, appearance)
                .await
                .unwrap();
            assert_eq!(
                source,
                BackgroundSource {
                    kind: BackgroundKind::Default,
                    payload: BackgroundPayload::Default {
                        image: image.to_string()
                    },
                }
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_temp_promotion_never_resolves_to_video() {
        let fx = fixture_with(StorageConfig {
            media_quota_bytes: Some(4),
            ..StorageConfig::default()
        })
        .await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::with_config(fx.local.connection(), &fx.config);
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let settings = SettingsRecord {
            background: BackgroundKind::Video,
            video: Some(MediaDescriptor::inline(mp4_data_url()).into_temp()),
            ..SettingsRecord::default()
        };
        let outcome = resolver.save_settings(settings).await.unwrap();
        assert!(outcome.discarded_temp_video);
        assert!(outcome.temp_video_quota_exceeded);
        assert_eq!(outcome.settings.video, None);
        assert!(media.get(MediaSlot::Video.name()).await.unwrap().is_none());

        for appearance in [Appearance::Light, Appearance::Dark] {
            let source = resolver
                .resolve_background_source(&outcome.settings, BackgroundKind::Video, appearance)
                .await
                .unwrap();
            assert_eq!(source.kind, BackgroundKind::Default);
        }
        let reloaded = resolver.load().await.unwrap();
        assert_eq!(reloaded.background, BackgroundKind::Default);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_image_write_rolls_back_promoted_video() {
        let fx = fixture_with(StorageConfig {
            media_quota_bytes: Some(64),
            ..StorageConfig::default()
        })
        .await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::with_config(fx.local.connection(), &fx.config);
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let settings = SettingsRecord {
            background: BackgroundKind::Video,
            video: Some(MediaDescriptor::inline(mp4_data_url()).into_temp()),
            image_light: Some(MediaDescriptor::inline(encode_data_url(&[7; 60], "image/png"))),
            ..SettingsRecord::default()
        };
        let error = resolver.save_settings(settings).await.unwrap_err();
        assert!(error.is_quota_exceeded());

        assert!(media.info(MediaSlot::Video.name()).await.unwrap().is_none());
        assert!(media.info(MediaSlot::ImageLight.name()).await.unwrap().is_none());
        assert_eq!(local_kv.get_value(MEDIA_METADATA_KEY).await.unwrap(), None);
        let reloaded = resolver.load().await.unwrap();
        assert_eq!(reloaded.video, None);
        assert_eq!(reloaded.background, BackgroundKind::Default);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_save_restores_replaced_video() {
        let fx = fixture_with(StorageConfig {
            media_quota_bytes: Some(64),
            ..StorageConfig::default()
        })
        .await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::with_config(fx.local.connection(), &fx.config);
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        media
            .put("video_main", vec![1, 2, 3, 4], Some("video/webm"), None)
            .await
            .unwrap();

        let settings = SettingsRecord {
            background: BackgroundKind::Video,
            video: Some(MediaDescriptor::inline(mp4_data_url()).into_temp()),
            image_light: Some(MediaDescriptor::inline(encode_data_url(&[7; 60], "image/png"))),
            ..SettingsRecord::default()
        };
        assert!(resolver.save_settings(settings).await.is_err());

        let video = media.get("video_main").await.unwrap().unwrap();
        assert_eq!(video.blob, vec![1, 2, 3, 4]);
        assert_eq!(video.mime_type, "video/webm");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_temp_video_is_discarded() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let settings = SettingsRecord {
            background: BackgroundKind::Video,
            video: Some(MediaDescriptor::inline("data:video/mp4;base64,@@@").into_temp()),
            ..SettingsRecord::default()
        };
        let outcome = resolver.save_settings(settings).await.unwrap();
        assert!(outcome.discarded_temp_video);
        assert!(!outcome.temp_video_quota_exceeded);
        assert_eq!(outcome.settings.background, BackgroundKind::Default);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn promoted_temp_video_becomes_permanent() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let mut temp = MediaDescriptor::inline(mp4_data_url()).into_temp();
        temp.original_name = Some("beach.mp4".to_string());
        let settings = SettingsRecord {
            background: BackgroundKind::Video,
            video: Some(temp),
            ..SettingsRecord::default()
        };

        let outcome = resolver.save_settings(settings).await.unwrap();
        let video = outcome.settings.video.clone().unwrap();
        assert_eq!(video.temp, Some(false));
        assert_eq!(video.source, MediaSource::Blob);
        assert_eq!(video.original_name.as_deref(), Some("beach.mp4"));
        assert_eq!(media.get("video_main").await.unwrap().unwrap().blob.len(), 8);

        let local = local_kv.get_value(MEDIA_METADATA_KEY).await.unwrap().unwrap();
        assert_eq!(local["video"]["temp"], json!(false));
        let synced = sync_kv.get_value(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(synced.get("video").is_none());

        let reloaded = resolver.load().await.unwrap();
        assert_eq!(reloaded.background, BackgroundKind::Video);
        let source = resolver
            .resolve_background_source(&reloaded, BackgroundKind::Video, Appearance::Light)
            .await
            .unwrap();
        assert_eq!(source.kind, BackgroundKind::Video);
        let BackgroundPayload::Media { url, opacity, blur, .. } = source.payload else {
            panic!("expected media payload");
        };
        assert!(url.starts_with("blob:"));
        assert_eq!((opacity, blur), (80, 2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blob_record_takes_precedence_over_path_descriptor() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        local_kv
            .set_value(
                MEDIA_METADATA_KEY,
                &json!({"imageLight": {"filePath": "userimg/a.png", "savedName": "a.png", "temp": false}}),
            )
            .await
            .unwrap();
        local_kv
            .set_value("userimg_a.png", &json!({"fileData": png_data_url()}))
            .await
            .unwrap();
        media
            .put("image_light", vec![1, 2, 3], Some("image/webp"), None)
            .await
            .unwrap();

        let path_only = SettingsRecord {
            image_light: Some(MediaDescriptor::file_path("userimg/a.png", None)),
            ..SettingsRecord::default()
        };
        let loaded = resolver.load().await.unwrap();
        for settings in [&path_only, &loaded] {
            let source = resolver
                .resolve_background_source(settings, BackgroundKind::Image, Appearance::Light)
                .await
                .unwrap();
            let BackgroundPayload::Media { url, mime_type, .. } = source.payload else {
                panic!("expected media payload");
            };
            assert!(url.starts_with("blob:suiyuan/"));
            assert_eq!(mime_type.as_deref(), Some("image/webp"));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn path_descriptor_falls_back_to_legacy_entry() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        local_kv
            .set_value("userimg_a.png", &json!({"fileData": png_data_url()}))
            .await
            .unwrap();
        let settings = SettingsRecord {
            image_dark: Some(MediaDescriptor::file_path("userimg/a.png", None)),
            ..SettingsRecord::default()
        };

        let source = resolver
            .resolve_background_source(&settings, BackgroundKind::Image, Appearance::Dark)
            .await
            .unwrap();
        assert_eq!(
            source.payload,
            BackgroundPayload::Media {
                url: png_data_url(),
                mime_type: Some("image/png".to_string()),
                opacity: 100,
                blur: 0,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolve_is_idempotent() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        media.put("image_dark", vec![9; 16], Some("image/jpeg"), None).await.unwrap();
        let settings = resolver.load().await.unwrap();

        let first = resolver
            .resolve_background_source(&settings, BackgroundKind::Image, Appearance::Dark)
            .await
            .unwrap();
        let second = resolver
            .resolve_background_source(&settings, BackgroundKind::Image, Appearance::Dark)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.object_urls().live_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn image_without_source_uses_theme_default() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let settings = SettingsRecord {
            background: BackgroundKind::Image,
            ..SettingsRecord::default()
        };
        let source = resolver
            .resolve_background_source(&settings, BackgroundKind::Image, Appearance::Dark)
            .await
            .unwrap();
        assert_eq!(source.kind, BackgroundKind::Default);
        assert_eq!(
            source.payload,
            BackgroundPayload::Default {
                image: "img/dark.jpg".to_string()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn solid_and_gradient_follow_appearance() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);
        let settings = SettingsRecord::default();

        let dark = resolver
            .resolve_background_source(&settings, BackgroundKind::Solid, Appearance::Dark)
            .await
            .unwrap();
        assert_eq!(
            dark.payload,
            BackgroundPayload::Solid {
                color: "#1a1a1a".to_string()
            }
        );

        let gradient = resolver
            .resolve_background_source(&settings, BackgroundKind::Gradient, Appearance::Light)
            .await
            .unwrap();
        assert_eq!(
            gradient.payload,
            BackgroundPayload::Gradient {
                start: "#667eea".to_string(),
                end: "#764ba2".to_string(),
                direction: "135deg".to_string(),
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_moves_inline_images_into_blob_store() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        local_kv
            .set_value("userimg_old.png", &json!({"fileData": png_data_url()}))
            .await
            .unwrap();
        local_kv
            .set_value("backgroundImage_dark", &json!("data:image/png;base64,AAAA"))
            .await
            .unwrap();

        let settings = SettingsRecord {
            background: BackgroundKind::Image,
            image_light: Some(MediaDescriptor::inline(png_data_url())),
            ..SettingsRecord::default()
        };
        let outcome = resolver.save_settings(settings).await.unwrap();

        assert_eq!(outcome.settings.image_light.as_ref().unwrap().source, MediaSource::Blob);
        assert_eq!(media.get("image_light").await.unwrap().unwrap().mime_type, "image/png");
        assert_eq!(local_kv.keys().await.unwrap(), vec![MEDIA_METADATA_KEY]);
        let local = local_kv.get_value(MEDIA_METADATA_KEY).await.unwrap().unwrap();
        assert_eq!(local["imageLight"]["savedName"], json!("image_light"));
        assert!(local["imageLight"].get("dataUrl").is_none());
        let synced = sync_kv.get_value(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(synced.get("imageLight").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_inline_media_is_kept_out_of_settings_record() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        let large = encode_data_url(&vec![7_u8; 150 * 1024], "image/jpeg");
        let settings = SettingsRecord {
            background: BackgroundKind::Image,
            image_light: Some(MediaDescriptor::inline(large)),
            ..SettingsRecord::default()
        };
        let outcome = resolver.save_settings(settings).await.unwrap();
        assert_eq!(outcome.settings.background, BackgroundKind::Image);
        assert_eq!(
            media.get("image_light").await.unwrap().unwrap().size_bytes,
            150 * 1024
        );
        let synced = sync_kv.get_value(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(synced.get("imageLight").is_none());

        let too_large = SettingsRecord {
            title_text: "t".repeat(120 * 1024),
            ..SettingsRecord::default()
        };
        let error = resolver.save_settings(too_large).await.unwrap_err();
        assert!(matches!(error, Error::SizeExceeded { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_notifies_subscribers() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let broadcaster = SettingsBroadcaster::default();
        let mut subscription = broadcaster.subscribe();
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config)
            .with_broadcaster(broadcaster);

        let settings = SettingsRecord {
            search_engine: "baidu".to_string(),
            ..SettingsRecord::default()
        };
        let outcome = resolver.save_settings(settings).await.unwrap();
        assert_eq!(outcome.notified, 1);

        let crate::propagation::SettingsMessage::UpdateSettings { settings } =
            subscription.recv().await.unwrap();
        assert_eq!(settings.search_engine, "baidu");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bundled_config_fills_empty_slots() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let bundled = BackgroundConfig::parse(&format!(
            r#"{{"background": {{"type": "image", "dataUrl": "{}", "fileName": "bundled.png"}}}}"#,
            png_data_url()
        ))
        .unwrap();
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config)
            .with_bundled(Some(bundled));

        media.put("image_dark", vec![5], Some("image/png"), None).await.unwrap();
        let settings = resolver.load().await.unwrap();

        assert!(matches!(
            settings.image_light.as_ref().unwrap().source,
            MediaSource::InlineData { .. }
        ));
        assert_eq!(settings.image_dark.as_ref().unwrap().source, MediaSource::Blob);
        assert_eq!(settings.video, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn export_embeds_stored_image_and_skips_temp_video() {
        let fx = fixture().await;
        let sync_kv = LibSqlKeyValueStore::new(fx.sync.connection(), "sync");
        let local_kv = LibSqlKeyValueStore::new(fx.local.connection(), "local");
        let media = LibSqlMediaStore::new(fx.local.connection());
        let resolver = BackgroundResolver::new(&sync_kv, &local_kv, &media, &fx.config);

        media.put("image_light", vec![137, 80, 78, 71], Some("image/png"), None).await.unwrap();
        let mut settings = resolver.load().await.unwrap();
        settings.background = BackgroundKind::Image;

        let exported = resolver
            .export_default_config(&settings, Appearance::Light)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exported.background.kind, BackgroundKind::Image);
        assert_eq!(exported.background.data_url, Some(png_data_url()));

        settings.background = BackgroundKind::Video;
        settings.video = Some(MediaDescriptor::inline(mp4_data_url()).into_temp());
        assert!(resolver
            .export_default_config(&settings, Appearance::Light)
            .await
            .unwrap()
            .is_none());

        settings.background = BackgroundKind::Solid;
        let solid = resolver
            .export_default_config(&settings, Appearance::Dark)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(solid.background.kind, BackgroundKind::Solid);
        assert_eq!(solid.background.data_url, None);
    }

    #[test]
    fn blank_saved_name_falls_back_to_slot_key() {
        let mut descriptor = MediaDescriptor::file_path("userimg/bg.png", None);
        descriptor.saved_name = Some("  ".to_string());
        assert_eq!(
            blob_candidates(MediaSlot::ImageDark, Some(&descriptor)),
            vec!["image_dark"]
        );

        descriptor.saved_name = Some("bg.png".to_string());
        assert_eq!(
            blob_candidates(MediaSlot::ImageDark, Some(&descriptor)),
            vec!["bg.png", "image_dark"]
        );
        assert_eq!(blob_candidates(MediaSlot::Video, None), vec!["video_main"]);
    }

    #[test]
    fn legacy_names_cover_path_variants() {
        let mut descriptor = MediaDescriptor::file_path("userimg/bg.png", None);
        descriptor.saved_name = Some("bg.png".to_string());
        assert_eq!(
            legacy_file_names(&descriptor, "userimg/bg.png"),
            vec!["bg.png", "userimg/bg.png"]
        );
    }
}
