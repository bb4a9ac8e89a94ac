//! suiyuan-core - Storage core of the SuiYuan start page
//!
//! This crate holds the settings record, the device-local media metadata and
//! blob stores, the background resolution policy that decides which of them
//! supplies the displayed background, and the settings change feed used by
//! every open start page.

pub mod background;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod propagation;
pub mod search;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use models::{MediaSlot, SettingsRecord};
