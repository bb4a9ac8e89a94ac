//! Storage tuning knobs shared by the core stores and the CLI.
//!
//! Every threshold the stores enforce lives here as a configurable default
//! rather than a constant baked into the store implementations.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_DATA_DIR: &str = "SUIYUAN_DATA_DIR";
const ENV_MEDIA_QUOTA_BYTES: &str = "SUIYUAN_MEDIA_QUOTA_BYTES";
const ENV_QUOTA_WARN_RATIO: &str = "SUIYUAN_QUOTA_WARN_RATIO";
const ENV_CLEANUP_KEEP_COUNT: &str = "SUIYUAN_CLEANUP_KEEP_COUNT";
const ENV_SETTINGS_MAX_BYTES: &str = "SUIYUAN_SETTINGS_MAX_BYTES";
const ENV_SYNC_QUOTA_BYTES: &str = "SUIYUAN_SYNC_QUOTA_BYTES";
const ENV_DEFAULT_CONFIG_PATH: &str = "SUIYUAN_DEFAULT_CONFIG";

/// Serialized-size ceiling for the settings record (100 KB).
pub const DEFAULT_SETTINGS_MAX_BYTES: usize = 100 * 1024;
/// Total quota of the cross-device sync tier.
pub const DEFAULT_SYNC_QUOTA_BYTES: u64 = 100 * 1024;
/// Fraction of the blob quota above which writes emit a warning.
pub const DEFAULT_QUOTA_WARN_RATIO: f64 = 0.8;
/// Records kept by `cleanup_old_files` when no count is given.
pub const DEFAULT_CLEANUP_KEEP_COUNT: usize = 5;

/// Tunables for the settings, metadata, and blob stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `sync.db` and `local.db`; `None` means the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Blob store quota. `None` when the platform exposes no quota.
    pub media_quota_bytes: Option<u64>,
    /// Warn when projected blob usage exceeds this fraction of the quota.
    pub quota_warn_ratio: f64,
    /// Default retention for `cleanup_old_files`.
    pub cleanup_keep_count: usize,
    /// Ceiling for the serialized settings record.
    pub settings_max_bytes: usize,
    /// Quota of the cross-device sync tier.
    pub sync_quota_bytes: Option<u64>,
    /// Bundled default-config document.
    pub default_config_path: Option<PathBuf>,
    /// Bundled fallback image for the light appearance.
    pub default_light_image: String,
    /// Bundled fallback image for the dark appearance.
    pub default_dark_image: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            media_quota_bytes: None,
            quota_warn_ratio: DEFAULT_QUOTA_WARN_RATIO,
            cleanup_keep_count: DEFAULT_CLEANUP_KEEP_COUNT,
            settings_max_bytes: DEFAULT_SETTINGS_MAX_BYTES,
            sync_quota_bytes: Some(DEFAULT_SYNC_QUOTA_BYTES),
            default_config_path: None,
            default_light_image: "img/light.jpg".to_string(),
            default_dark_image: "img/dark.jpg".to_string(),
        }
    }
}

impl StorageConfig {
    /// Load overrides from `SUIYUAN_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    /// Path of the cross-device settings database.
    pub fn sync_db_path(&self, fallback_dir: PathBuf) -> PathBuf {
        self.data_dir.clone().unwrap_or(fallback_dir).join("sync.db")
    }

    /// Path of the device-local metadata and blob database.
    pub fn local_db_path(&self, fallback_dir: PathBuf) -> PathBuf {
        self.data_dir.clone().unwrap_or(fallback_dir).join("local.db")
    }
}

fn parse_config<F>(lookup: F) -> Result<StorageConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| normalize_text_option(lookup(key));
    let mut config = StorageConfig::default();

    if let Some(dir) = read(ENV_DATA_DIR) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(quota) = read(ENV_MEDIA_QUOTA_BYTES) {
        config.media_quota_bytes = Some(parse_number(ENV_MEDIA_QUOTA_BYTES, &quota)?);
    }
    if let Some(ratio) = read(ENV_QUOTA_WARN_RATIO) {
        let ratio: f64 = parse_number(ENV_QUOTA_WARN_RATIO, &ratio)?;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(Error::InvalidInput(format!(
                "{ENV_QUOTA_WARN_RATIO} must be between 0 and 1"
            )));
        }
        config.quota_warn_ratio = ratio;
    }
    if let Some(count) = read(ENV_CLEANUP_KEEP_COUNT) {
        config.cleanup_keep_count = parse_number(ENV_CLEANUP_KEEP_COUNT, &count)?;
    }
    if let Some(max) = read(ENV_SETTINGS_MAX_BYTES) {
        config.settings_max_bytes = parse_number(ENV_SETTINGS_MAX_BYTES, &max)?;
    }
    if let Some(quota) = read(ENV_SYNC_QUOTA_BYTES) {
        config.sync_quota_bytes = Some(parse_number(ENV_SYNC_QUOTA_BYTES, &quota)?);
    }
    if let Some(path) = read(ENV_DEFAULT_CONFIG_PATH) {
        config.default_config_path = Some(PathBuf::from(path));
    }

    Ok(config)
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} has an invalid value: {raw}")))
}
