//! Database layer for SuiYuan

mod connection;
mod migrations;

pub use connection::{Database, SyncConfig};
