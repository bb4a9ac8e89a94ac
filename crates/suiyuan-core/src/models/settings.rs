//! Start page settings model

use serde::{Deserialize, Deserializer, Serialize};

use super::media::{MediaDescriptor, MediaSlot, MediaSource};

/// Theme mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Light theme
    #[default]
    Light,
    /// Dark theme
    Dark,
    /// Follow system preference
    Auto,
}

impl ThemeMode {
    /// Concrete appearance for this mode.
    pub const fn appearance(self, system_prefers_dark: bool) -> Appearance {
        match self {
            Self::Light => Appearance::Light,
            Self::Dark => Appearance::Dark,
            Self::Auto if system_prefers_dark => Appearance::Dark,
            Self::Auto => Appearance::Light,
        }
    }
}

/// Light or dark rendering, as actually shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    Light,
    Dark,
}

impl Appearance {
    /// Image slot used for this appearance.
    pub const fn image_slot(self) -> MediaSlot {
        match self {
            Self::Light => MediaSlot::ImageLight,
            Self::Dark => MediaSlot::ImageDark,
        }
    }
}

/// Background type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    /// Bundled image matching the appearance
    #[default]
    Default,
    Solid,
    Gradient,
    Image,
    Video,
}

/// What the page title area shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TitleDisplay {
    None,
    #[default]
    Text,
    /// Live clock
    Time,
}

/// User-defined search engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEngine {
    pub id: String,
    pub name: String,
    /// Search URL template; `%s` is replaced with the encoded query
    pub url: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub icon: String,
}

/// Start page settings.
///
/// The media fields exist only in memory; the persisted record carries none of
/// them (see [`SettingsRecord::without_media`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsRecord {
    pub search_engine: String,
    pub theme: ThemeMode,
    pub background: BackgroundKind,
    pub title_display: TitleDisplay,
    pub show_seconds: bool,
    pub title_text: String,
    pub title_fill_color: String,
    pub title_outline_color: String,
    pub solid_color: String,
    pub solid_color_dark: String,
    pub gradient_start: String,
    pub gradient_end: String,
    pub gradient_direction: String,
    /// Percent
    pub image_opacity: u32,
    /// Pixels
    pub image_blur: u32,
    /// Percent
    pub video_opacity: u32,
    /// Pixels
    pub video_blur: u32,
    pub custom_engines: Vec<CustomEngine>,
    #[serde(
        deserialize_with = "deserialize_descriptor",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_light: Option<MediaDescriptor>,
    #[serde(
        deserialize_with = "deserialize_descriptor",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_dark: Option<MediaDescriptor>,
    #[serde(
        deserialize_with = "deserialize_descriptor",
        skip_serializing_if = "Option::is_none"
    )]
    pub video: Option<MediaDescriptor>,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            search_engine: "bing".to_string(),
            theme: ThemeMode::Light,
            background: BackgroundKind::Default,
            title_display: TitleDisplay::Text,
            show_seconds: true,
            title_text: "SuiYuan-Search".to_string(),
            title_fill_color: "#ffffff".to_string(),
            title_outline_color: "#000000".to_string(),
            solid_color: "#ffffff".to_string(),
            solid_color_dark: "#1a1a1a".to_string(),
            gradient_start: "#667eea".to_string(),
            gradient_end: "#764ba2".to_string(),
            gradient_direction: "135deg".to_string(),
            image_opacity: 100,
            image_blur: 0,
            video_opacity: 80,
            video_blur: 2,
            custom_engines: Vec::new(),
            image_light: None,
            image_dark: None,
            video: None,
        }
    }
}

impl SettingsRecord {
    /// Field names that hold media descriptors.
    pub const MEDIA_FIELDS: [&'static str; 3] = ["imageLight", "imageDark", "video"];

    /// Descriptor currently assigned to a slot.
    pub const fn slot(&self, slot: MediaSlot) -> Option<&MediaDescriptor> {
        match slot {
            MediaSlot::ImageLight => self.image_light.as_ref(),
            MediaSlot::ImageDark => self.image_dark.as_ref(),
            MediaSlot::Video => self.video.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: MediaSlot) -> &mut Option<MediaDescriptor> {
        match slot {
            MediaSlot::ImageLight => &mut self.image_light,
            MediaSlot::ImageDark => &mut self.image_dark,
            MediaSlot::Video => &mut self.video,
        }
    }

    /// Copy with every media descriptor removed.
    #[must_use]
    pub fn without_media(&self) -> Self {
        Self {
            image_light: None,
            image_dark: None,
            video: None,
            ..self.clone()
        }
    }

    /// Look up a custom engine by id.
    pub fn custom_engine(&self, id: &str) -> Option<&CustomEngine> {
        self.custom_engines.iter().find(|engine| engine.id == id)
    }
}

/// Empty legacy strings (`""`) mean "no media".
fn deserialize_descriptor<'de, D>(deserializer: D) -> Result<Option<MediaDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let descriptor = Option::<MediaDescriptor>::deserialize(deserializer)?;
    Ok(descriptor.filter(|descriptor| {
        !matches!(&descriptor.source, MediaSource::Legacy { value } if value.trim().is_empty())
    }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = SettingsRecord::default();
        assert_eq!(settings.search_engine, "bing");
        assert_eq!(settings.theme, ThemeMode::Light);
        assert_eq!(settings.background, BackgroundKind::Default);
        assert!(settings.show_seconds);
    }

    #[test]
    fn partial_record_fills_defaults() {
        let settings: SettingsRecord = serde_json::from_value(json!({
            "searchEngine": "google",
            "background": "gradient",
            "imageLight": ""
        }))
        .unwrap();

        assert_eq!(settings.search_engine, "google");
        assert_eq!(settings.background, BackgroundKind::Gradient);
        assert_eq!(settings.gradient_start, "#667eea");
        assert_eq!(settings.image_light, None);
    }

    #[test]
    fn serialization_omits_absent_media() {
        let value = serde_json::to_value(SettingsRecord::default()).unwrap();
        let object = value.as_object().unwrap();
        for field in SettingsRecord::MEDIA_FIELDS {
            assert!(!object.contains_key(field));
        }
        assert_eq!(object["titleDisplay"], json!("text"));
    }

    #[test]
    fn auto_theme_follows_system_preference() {
        assert_eq!(ThemeMode::Auto.appearance(true), Appearance::Dark);
        assert_eq!(ThemeMode::Auto.appearance(false), Appearance::Light);
        assert_eq!(ThemeMode::Dark.appearance(false), Appearance::Dark);
    }

    #[test]
    fn without_media_keeps_scalars() {
        let settings = SettingsRecord {
            search_engine: "baidu".to_string(),
            video: Some(MediaDescriptor::inline("data:video/mp4;base64,AAAA")),
            ..SettingsRecord::default()
        };
        let stripped = settings.without_media();
        assert_eq!(stripped.video, None);
        assert_eq!(stripped.search_engine, "baidu");
    }
}
