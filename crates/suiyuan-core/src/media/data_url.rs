//! `data:<mime>;base64,<payload>` encoding and decoding

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;

use crate::error::{Error, Result};

static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[^;,]*)(?P<params>(?:;[^;,]*)*?);base64,(?P<payload>.*)$")
        .expect("data URL pattern is valid")
});

/// Decode a base64 `data:` URL into its bytes and MIME type.
///
/// An empty MIME part yields `application/octet-stream`.
pub fn decode_data_url(data_url: &str) -> Result<(Vec<u8>, String)> {
    let captures = DATA_URL_RE
        .captures(data_url.trim())
        .ok_or_else(|| Error::InvalidDataUrl(preview(data_url)))?;

    let mime_type = match captures.name("mime").map(|m| m.as_str().trim()) {
        Some(mime) if !mime.is_empty() => mime.to_string(),
        _ => "application/octet-stream".to_string(),
    };
    let payload: String = captures
        .name("payload")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|error| Error::InvalidDataUrl(format!("{}: {error}", preview(data_url))))?;
    Ok((bytes, mime_type))
}

/// Encode bytes as a base64 `data:` URL.
pub fn encode_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

fn preview(data_url: &str) -> String {
    data_url.chars().take(32).collect()
}

/// Media payload handed to the theme-slot helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaData {
    /// Raw bytes with an optional MIME type
    Bytes {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
    /// Base64 `data:` URL
    DataUrl(String),
}

impl MediaData {
    /// Bytes and MIME type (when known) of this payload.
    pub fn into_parts(self) -> Result<(Vec<u8>, Option<String>)> {
        match self {
            Self::Bytes { bytes, mime_type } => Ok((bytes, mime_type)),
            Self::DataUrl(data_url) => {
                let (bytes, mime_type) = decode_data_url(&data_url)?;
                Ok((bytes, Some(mime_type)))
            }
        }
    }
}

impl From<Vec<u8>> for MediaData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes {
            bytes,
            mime_type: None,
        }
    }
}
