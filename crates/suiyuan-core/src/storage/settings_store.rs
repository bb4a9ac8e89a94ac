//! Cross-device settings record store

use serde_json::{Map, Value};

use super::kv_store::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{CustomEngine, SettingsRecord};

/// Key of the settings record in the cross-device store
pub const SETTINGS_KEY: &str = "suiYuanSettings";

const STRING_FIELDS: [&str; 12] = [
    "searchEngine",
    "theme",
    "background",
    "titleDisplay",
    "titleText",
    "titleFillColor",
    "titleOutlineColor",
    "solidColor",
    "solidColorDark",
    "gradientStart",
    "gradientEnd",
    "gradientDirection",
];
const BOOL_FIELDS: [&str; 1] = ["showSeconds"];
const NUMBER_FIELDS: [&str; 4] = ["imageOpacity", "imageBlur", "videoOpacity", "videoBlur"];
const OBSOLETE_FIELDS: [&str; 2] = ["videoLight", "videoDark"];

/// Settings record persistence with validation and a size ceiling.
pub struct SettingsStore<'a, S> {
    kv: &'a S,
    max_bytes: usize,
}

impl<'a, S: KeyValueStore> SettingsStore<'a, S> {
    pub const fn new(kv: &'a S, max_bytes: usize) -> Self {
        Self { kv, max_bytes }
    }

    /// Load the record, falling back to defaults for anything missing or unreadable.
    pub async fn load(&self) -> Result<SettingsRecord> {
        match self.kv.get_value(SETTINGS_KEY).await? {
            Some(value) => Ok(settings_from_value(value)),
            None => Ok(SettingsRecord::default()),
        }
    }

    /// Validate and persist `settings`. Media fields are never written.
    pub async fn save(&self, settings: &SettingsRecord) -> Result<SettingsRecord> {
        self.save_value(serde_json::to_value(settings)?).await
    }

    /// Validate and persist an untyped record.
    ///
    /// Returns the validated record, media fields included.
    pub async fn save_value(&self, value: Value) -> Result<SettingsRecord> {
        let validated = validate_settings(value, self.max_bytes)?;
        let record = decode_leniently(validated);
        let persisted = serde_json::to_value(record.without_media())?;
        self.kv.set_value(SETTINGS_KEY, &persisted).await?;
        tracing::debug!(key = SETTINGS_KEY, "Saved settings");
        Ok(record)
    }
}

/// Normalize an untyped settings record before it is written.
///
/// Coerces mismatched scalars, normalizes `customEngines`, drops binary
/// handles and obsolete fields, and enforces the serialized-size ceiling.
pub fn validate_settings(value: Value, max_bytes: usize) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = value else {
        return Err(not_an_object(&value));
    };

    for field in OBSOLETE_FIELDS {
        map.remove(field);
    }
    map.retain(|key, value| {
        let keep = STRING_FIELDS.contains(&key.as_str()) || !is_binary_handle(value);
        if !keep {
            tracing::warn!(key = %key, "Dropping binary handle from settings");
        }
        keep
    });
    coerce_fields(&mut map);

    let size_bytes = serialized_len(&map)?;
    if size_bytes > max_bytes {
        tracing::warn!(
            bytes = size_bytes,
            limit = max_bytes,
            "Settings over size limit, removing media fields"
        );
        for field in SettingsRecord::MEDIA_FIELDS {
            map.remove(field);
        }
        let size_bytes = serialized_len(&map)?;
        if size_bytes > max_bytes {
            return Err(Error::SizeExceeded {
                size_bytes,
                limit_bytes: max_bytes,
            });
        }
    }

    Ok(map)
}

/// Decode a record supplied by a caller for saving.
///
/// Unlike [`settings_from_value`], a non-object is an error rather than a
/// reason to fall back to defaults.
pub fn settings_from_input(value: Value) -> Result<SettingsRecord> {
    if !value.is_object() {
        return Err(not_an_object(&value));
    }
    Ok(settings_from_value(value))
}

fn not_an_object(value: &Value) -> Error {
    Error::InvalidInput(format!(
        "Settings must be an object, got {}",
        json_type_name(value)
    ))
}

/// Decode a stored record, migrating legacy fields and tolerating bad values.
pub fn settings_from_value(value: Value) -> SettingsRecord {
    let Value::Object(mut map) = value else {
        tracing::warn!("Stored settings are not an object, using defaults");
        return SettingsRecord::default();
    };

    if let Some(dark_mode) = map.remove("darkMode") {
        if !map.contains_key("theme") {
            let theme = if truthy(&dark_mode) { "dark" } else { "light" };
            map.insert("theme".to_string(), Value::from(theme));
            tracing::info!(theme, "Migrated legacy darkMode setting");
        }
    }
    for field in OBSOLETE_FIELDS {
        map.remove(field);
    }
    coerce_fields(&mut map);
    decode_leniently(map)
}

/// Decode `map`, dropping individual fields that do not fit the record.
fn decode_leniently(map: Map<String, Value>) -> SettingsRecord {
    match serde_json::from_value(Value::Object(map.clone())) {
        Ok(record) => record,
        Err(error) => {
            tracing::warn!(%error, "Settings contain invalid fields");
            let mut accepted = Map::new();
            for (key, value) in map {
                accepted.insert(key.clone(), value);
                if serde_json::from_value::<SettingsRecord>(Value::Object(accepted.clone())).is_err() {
                    tracing::warn!(key = %key, "Dropping invalid settings field");
                    accepted.remove(&key);
                }
            }
            serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
        }
    }
}

fn coerce_fields(map: &mut Map<String, Value>) {
    for field in STRING_FIELDS {
        let Some(value) = map.get(field) else { continue };
        match value {
            Value::String(_) => {}
            Value::Number(number) => {
                let text = number.to_string();
                map.insert(field.to_string(), Value::String(text));
            }
            Value::Bool(flag) => {
                let text = flag.to_string();
                map.insert(field.to_string(), Value::String(text));
            }
            Value::Null | Value::Array(_) | Value::Object(_) => {
                map.remove(field);
            }
        }
    }

    for field in BOOL_FIELDS {
        if let Some(value) = map.get(field) {
            let flag = truthy(value);
            map.insert(field.to_string(), Value::Bool(flag));
        }
    }

    for field in NUMBER_FIELDS {
        let Some(value) = map.get(field) else { continue };
        match coerce_unsigned(value) {
            Some(number) => {
                map.insert(field.to_string(), Value::from(number));
            }
            None => {
                map.remove(field);
            }
        }
    }

    if let Some(engines) = map.remove("customEngines") {
        let engines = match engines {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            _ => Vec::new(),
        };
        let engines: Vec<Value> = engines
            .into_iter()
            .filter(|engine| serde_json::from_value::<CustomEngine>(engine.clone()).is_ok())
            .collect();
        map.insert("customEngines".to_string(), Value::Array(engines));
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_unsigned(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Raw file or byte handles that cannot live in a JSON record.
fn is_binary_handle(value: &Value) -> bool {
    match value {
        Value::String(text) => text.starts_with("blob:"),
        Value::Array(items) => {
            !items.is_empty() && items.iter().all(|item| item.as_u64().is_some_and(|b| b <= 255))
        }
        Value::Object(map) => ["blob", "bytes", "arrayBuffer"]
            .iter()
            .any(|key| map.contains_key(*key)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn serialized_len(map: &Map<String, Value>) -> Result<usize> {
    Ok(serde_json::to_vec(map)?.len())
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
