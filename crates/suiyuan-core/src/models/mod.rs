//! Data models for SuiYuan

mod background_config;
mod media;
mod settings;

pub use background_config::{BackgroundConfig, BundledBackground};
pub use media::{MediaDescriptor, MediaFileInfo, MediaRecord, MediaSlot, MediaSource};
pub use settings::{
    Appearance, BackgroundKind, CustomEngine, SettingsRecord, ThemeMode, TitleDisplay,
};
