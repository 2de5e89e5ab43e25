//! Two-way sync of per-table and per-column sync settings between a folder of
//! JSON descriptors and a connector's remote schema.

pub mod apply;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod export;

pub use apply::{apply_table_configs, ApplyReport};
pub use client::SchemaClient;
pub use config::Config;
pub use error::SyncError;
pub use export::save_table_configs;
