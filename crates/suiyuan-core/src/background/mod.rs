//! Media resolution: which store supplies the background actually shown.

mod resolver;

use serde::{Deserialize, Serialize};

use crate::models::{BackgroundKind, SettingsRecord};
use crate::storage::QuotaWarning;

pub use resolver::BackgroundResolver;

/// What the start page should render as its background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSource {
    /// Kind actually rendered; differs from the requested kind after a fallback
    pub kind: BackgroundKind,
    pub payload: BackgroundPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BackgroundPayload {
    Solid {
        color: String,
    },
    Gradient {
        start: String,
        end: String,
        direction: String,
    },
    #[serde(rename_all = "camelCase")]
    Media {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// Percent
        opacity: u32,
        /// Pixels
        blur: u32,
    },
    /// Bundled image for the current appearance
    Default {
        image: String,
    },
}

/// Result of `save_settings`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// Settings as persisted, with media descriptors pointing at the blob store
    pub settings: SettingsRecord,
    /// Non-fatal warnings from blob writes
    pub quota_warnings: Vec<QuotaWarning>,
    /// A temp video could not be promoted and was dropped
    pub discarded_temp_video: bool,
    /// The dropped temp video did not fit in the media quota
    pub temp_video_quota_exceeded: bool,
    /// Start pages reached by the change notification
    pub notified: usize,
}
