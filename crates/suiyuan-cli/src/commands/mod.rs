pub mod cleanup;
pub mod common;
pub mod completions;
pub mod export_config;
pub mod info;
pub mod media;
pub mod resolve;
pub mod search;
pub mod settings;
pub mod sync;
