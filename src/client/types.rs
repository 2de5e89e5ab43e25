// src/client/types.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every response wraps its payload in `{"code": ..., "data": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T: Default> {
    #[serde(default)]
    pub data: T,
}

/// Capability gate attached to tables and columns, e.g.
/// `{"allowed": false, "reason_code": "SYSTEM_COLUMN", "reason": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    /// Anything else the service attaches, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PatchSettings {
    /// Only an explicit `false` denies.
    pub fn denies(&self) -> bool {
        self.allowed == Some(false)
    }
}

/// `data` of `GET /connections/{id}/schemas`.
#[derive(Debug, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub schemas: IndexMap<String, RemoteSchema>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteSchema {
    #[serde(default)]
    pub name_in_destination: Option<String>,
    #[serde(default)]
    pub tables: IndexMap<String, RemoteTable>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteTable {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub sync_mode: Option<String>,
    #[serde(default)]
    pub enabled_patch_settings: Option<PatchSettings>,
    #[serde(default)]
    pub supports_columns_config: Option<bool>,
}

/// `data` of `GET .../tables/{table}/columns`.
#[derive(Debug, Default, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default)]
    pub columns: IndexMap<String, RemoteColumn>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteColumn {
    #[serde(default)]
    pub name_in_destination: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub hashed: Option<bool>,
    #[serde(default)]
    pub is_primary_key: Option<bool>,
    #[serde(default)]
    pub enabled_patch_settings: Option<PatchSettings>,
}

/// Body of `POST /connections/{id}/schemas/reload`.
#[derive(Debug, Serialize)]
pub(crate) struct ReloadRequest {
    pub exclude_mode: &'static str,
}

impl ReloadRequest {
    pub const PRESERVE: Self = Self {
        exclude_mode: "PRESERVE",
    };
}

/// Partial update for one table. `sync_mode` is left out of the body when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePatch {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,
}

/// Partial update for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnPatch {
    pub enabled: bool,
    pub hashed: bool,
}
