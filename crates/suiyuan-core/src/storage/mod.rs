//! The three storage tiers: cross-device settings, device-local metadata, and blobs.

mod kv_store;
mod media_store;
mod metadata_store;
mod settings_store;

pub use kv_store::{KeyValueStore, LibSqlKeyValueStore};
pub use media_store::{
    CleanupReport, LibSqlMediaStore, MediaStore, PutOutcome, QuotaWarning, SlotHandle, StorageInfo,
};
pub use metadata_store::{
    MediaMetadata, MediaMetadataStore, LEGACY_FILE_PREFIX, LEGACY_KEYS, MEDIA_METADATA_KEY,
};
pub use settings_store::{
    settings_from_input, settings_from_value, validate_settings, SettingsStore, SETTINGS_KEY,
};
