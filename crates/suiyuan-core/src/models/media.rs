//! Media slots, blob records, and lightweight media descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// One of the three fixed background-media roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSlot {
    /// Background image for the light appearance
    ImageLight,
    /// Background image for the dark appearance
    ImageDark,
    /// Background video
    #[serde(rename = "video_main")]
    Video,
}

impl MediaSlot {
    /// All slots, in load order.
    pub const ALL: [Self; 3] = [Self::ImageLight, Self::ImageDark, Self::Video];

    /// Blob store key for this slot.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ImageLight => "image_light",
            Self::ImageDark => "image_dark",
            Self::Video => "video_main",
        }
    }

    /// Field name used for this slot in settings and in the metadata map.
    pub const fn field(self) -> &'static str {
        match self {
            Self::ImageLight => "imageLight",
            Self::ImageDark => "imageDark",
            Self::Video => "video",
        }
    }

    pub const fn is_video(self) -> bool {
        matches!(self, Self::Video)
    }

    /// MIME type assumed when a record or descriptor carries none.
    pub const fn fallback_mime_type(self) -> &'static str {
        match self {
            Self::ImageLight | Self::ImageDark => "image/jpeg",
            Self::Video => "video/mp4",
        }
    }
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MediaSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "image_light" => Ok(Self::ImageLight),
            "image_dark" => Ok(Self::ImageDark),
            "video_main" => Ok(Self::Video),
            other => Err(Error::InvalidInput(format!("Unknown media slot: {other}"))),
        }
    }
}

/// A binary record in the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Logical name (primary key)
    pub name: String,
    /// Raw bytes
    pub blob: Vec<u8>,
    /// Content MIME type
    pub mime_type: String,
    /// Payload size in bytes
    pub size_bytes: u64,
    /// First write (Unix ms)
    pub created_at: i64,
    /// Most recent overwrite (Unix ms)
    pub last_updated_at: i64,
}

/// Blob record metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFileInfo {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub created_at: i64,
    pub last_updated_at: i64,
}

impl From<&MediaRecord> for MediaFileInfo {
    fn from(record: &MediaRecord) -> Self {
        Self {
            name: record.name.clone(),
            size_bytes: record.size_bytes,
            mime_type: record.mime_type.clone(),
            created_at: record.created_at,
            last_updated_at: record.last_updated_at,
        }
    }
}

/// Where a descriptor's pixels or frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Bytes live in the blob store under `saved_name` (or the slot name).
    Blob,
    /// Bytes are carried inline as a `data:` URL.
    InlineData { data_url: String },
    /// Bytes were copied into the device-local store under a file path.
    FilePath {
        file_path: String,
        data_url: Option<String>,
    },
    /// Bare string from before descriptors were objects: a data URL or a URL.
    Legacy { value: String },
}

/// Lightweight reference to a background image or video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DescriptorWire", into = "DescriptorWire")]
pub struct MediaDescriptor {
    pub source: MediaSource,
    /// Display name
    pub name: Option<String>,
    /// Key under which the bytes were saved
    pub saved_name: Option<String>,
    /// File name chosen by the user
    pub original_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    /// Last update (Unix ms)
    pub last_updated: Option<i64>,
    /// `None` marks a record written before the temp/permanent distinction.
    pub temp: Option<bool>,
}

impl MediaDescriptor {
    fn with_source(source: MediaSource) -> Self {
        Self {
            source,
            name: None,
            saved_name: None,
            original_name: None,
            mime_type: None,
            size_bytes: None,
            last_updated: None,
            temp: None,
        }
    }

    /// Descriptor for a record held in the blob store.
    pub fn stored(slot: MediaSlot, mime_type: impl Into<String>, size_bytes: u64, last_updated: i64) -> Self {
        Self {
            saved_name: Some(slot.name().to_string()),
            mime_type: Some(mime_type.into()),
            size_bytes: Some(size_bytes),
            last_updated: Some(last_updated),
            temp: Some(false),
            ..Self::with_source(MediaSource::Blob)
        }
    }

    /// Descriptor carrying its bytes inline.
    pub fn inline(data_url: impl Into<String>) -> Self {
        Self::with_source(MediaSource::InlineData {
            data_url: data_url.into(),
        })
    }

    /// Descriptor pointing at a path in the device-local store.
    pub fn file_path(file_path: impl Into<String>, data_url: Option<String>) -> Self {
        Self::with_source(MediaSource::FilePath {
            file_path: file_path.into(),
            data_url,
        })
    }

    /// Video selected for preview but not yet committed.
    #[must_use]
    pub const fn into_temp(mut self) -> Self {
        self.temp = Some(true);
        self
    }

    /// Provisional (single-session) descriptor.
    pub const fn is_temp(&self) -> bool {
        matches!(self.temp, Some(true))
    }

    /// Whether the descriptor predates the temp marker.
    pub const fn lacks_temp_marker(&self) -> bool {
        self.temp.is_none()
    }

    /// Inline `data:` URL, if the descriptor carries one.
    pub fn data_url(&self) -> Option<&str> {
        match &self.source {
            MediaSource::InlineData { data_url } => Some(data_url),
            MediaSource::FilePath { data_url, .. } => data_url.as_deref(),
            MediaSource::Legacy { value } if value.starts_with("data:") => Some(value),
            MediaSource::Blob | MediaSource::Legacy { .. } => None,
        }
    }

    /// Blob store key to try first; a blank saved name falls back to the slot.
    pub fn blob_key(&self, slot: MediaSlot) -> &str {
        self.saved_name
            .as_deref()
            .filter(|saved| !saved.trim().is_empty())
            .unwrap_or_else(|| slot.name())
    }

    /// Copy safe to write to the device-local metadata store.
    ///
    /// Inline payloads are removed; a descriptor left with nothing but an
    /// inline payload yields `None`.
    pub fn to_metadata(&self) -> Option<Self> {
        let source = match &self.source {
            MediaSource::Blob => MediaSource::Blob,
            MediaSource::InlineData { .. } => return None,
            MediaSource::FilePath { file_path, .. } => MediaSource::FilePath {
                file_path: file_path.clone(),
                data_url: None,
            },
            MediaSource::Legacy { value } if value.starts_with("data:") => return None,
            MediaSource::Legacy { value } => MediaSource::Legacy {
                value: value.clone(),
            },
        };
        Some(Self {
            source,
            ..self.clone()
        })
    }
}

/// On-disk shape: either a bare legacy string or a flat camelCase object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DescriptorWire {
    Bare(String),
    Record(DescriptorFields),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_url: Option<String>,
    #[serde(default, skip_serializing)]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    last_updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temp: Option<bool>,
}

impl From<DescriptorWire> for MediaDescriptor {
    fn from(wire: DescriptorWire) -> Self {
        let fields = match wire {
            DescriptorWire::Bare(value) => {
                return Self::with_source(MediaSource::Legacy { value });
            }
            DescriptorWire::Record(fields) => fields,
        };

        let data_url = fields.data_url.or(fields.url).filter(|url| !url.is_empty());
        let source = match (fields.file_path.filter(|path| !path.is_empty()), data_url) {
            (Some(file_path), data_url) => MediaSource::FilePath {
                file_path,
                data_url,
            },
            (None, Some(data_url)) => MediaSource::InlineData { data_url },
            (None, None) => MediaSource::Blob,
        };

        Self {
            source,
            name: fields.name,
            saved_name: fields.saved_name,
            original_name: fields.original_name,
            mime_type: fields.mime_type,
            size_bytes: fields.size,
            last_updated: fields.last_updated,
            temp: fields.temp,
        }
    }
}

impl From<MediaDescriptor> for DescriptorWire {
    fn from(descriptor: MediaDescriptor) -> Self {
        let (file_path, data_url) = match descriptor.source {
            MediaSource::Legacy { value } => return Self::Bare(value),
            MediaSource::Blob => (None, None),
            MediaSource::InlineData { data_url } => (None, Some(data_url)),
            MediaSource::FilePath {
                file_path,
                data_url,
            } => (Some(file_path), data_url),
        };

        Self::Record(DescriptorFields {
            file_path,
            data_url,
            url: None,
            name: descriptor.name,
            saved_name: descriptor.saved_name,
            original_name: descriptor.original_name,
            mime_type: descriptor.mime_type,
            size: descriptor.size_bytes,
            last_updated: descriptor.last_updated,
            temp: descriptor.temp,
        })
    }
}

/// Accepts Unix-ms numbers and RFC 3339 strings.
#[allow(clippy::cast_possible_truncation)]
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64)),
        Some(serde_json::Value::String(text)) => chrono::DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn slot_names_round_trip_through_from_str() {
        for slot in MediaSlot::ALL {
            assert_eq!(slot.name().parse::<MediaSlot>().unwrap(), slot);
        }
        assert!("video".parse::<MediaSlot>().is_err());
    }

    #[test]
    fn bare_string_parses_as_legacy() {
        let descriptor: MediaDescriptor = serde_json::from_value(json!("data:image/png;base64,AAAA")).unwrap();
        assert_eq!(
            descriptor.source,
            MediaSource::Legacy {
                value: "data:image/png;base64,AAAA".to_string()
            }
        );
        assert_eq!(descriptor.data_url(), Some("data:image/png;base64,AAAA"));
        assert!(descriptor.lacks_temp_marker());
    }

    #[test]
    fn record_with_path_and_data_prefers_path_source() {
        let descriptor: MediaDescriptor = serde_json::from_value(json!({
            "filePath": "userimg/bg.mp4",
            "dataUrl": "data:video/mp4;base64,AAAA",
            "savedName": "bg.mp4",
            "type": "video/mp4",
            "size": 42,
            "temp": true
        }))
        .unwrap();

        assert_eq!(
            descriptor.source,
            MediaSource::FilePath {
                file_path: "userimg/bg.mp4".to_string(),
                data_url: Some("data:video/mp4;base64,AAAA".to_string()),
            }
        );
        assert!(descriptor.is_temp());
        assert_eq!(descriptor.size_bytes, Some(42));
    }

    #[test]
    fn legacy_url_field_is_read_as_inline_data() {
        let descriptor: MediaDescriptor =
            serde_json::from_value(json!({"url": "data:image/png;base64,AAAA", "name": "a.png"})).unwrap();
        assert!(matches!(descriptor.source, MediaSource::InlineData { .. }));
    }

    #[test]
    fn iso_last_updated_is_converted_to_millis() {
        let descriptor: MediaDescriptor = serde_json::from_value(json!({
            "savedName": "video_main",
            "lastUpdated": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(descriptor.last_updated, Some(1_704_067_200_000));
        assert_eq!(descriptor.source, MediaSource::Blob);
    }

    #[test]
    fn metadata_copy_drops_inline_payloads() {
        let inline = MediaDescriptor::inline("data:image/png;base64,AAAA");
        assert_eq!(inline.to_metadata(), None);

        let path = MediaDescriptor::file_path("userimg/a.png", Some("data:image/png;base64,AAAA".to_string()));
        let metadata = path.to_metadata().unwrap();
        assert_eq!(metadata.data_url(), None);

        let serialized = serde_json::to_value(&metadata).unwrap();
        assert_eq!(serialized, json!({"filePath": "userimg/a.png"}));
    }

    #[test]
    fn stored_descriptor_serializes_without_payload() {
        let descriptor = MediaDescriptor::stored(MediaSlot::Video, "video/mp4", 10, 5);
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "savedName": "video_main",
                "type": "video/mp4",
                "size": 10,
                "lastUpdated": 5,
                "temp": false
            })
        );
    }
}
