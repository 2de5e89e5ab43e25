// src/descriptor/types.rs

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::types::PatchSettings;

/// One table's sync configuration as stored in `<table>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub sync_mode: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Whether `enabled`/`sync_mode` may be patched. Written as a flag;
    /// hand-edited files may also carry the service's `{"allowed": ...}` object.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enabled_patch_settings: Option<bool>,
    #[serde(default)]
    pub supports_columns_config: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: IndexMap<String, ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            sync_mode: None,
            enabled: None,
            enabled_patch_settings: None,
            supports_columns_config: None,
            columns: IndexMap::new(),
        }
    }

    /// Table-level patching is permitted only when the flag is truthy.
    pub fn table_patch_allowed(&self) -> bool {
        self.enabled_patch_settings == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
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
    /// Alternative spelling of the capability gate, accepted on input only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_columns_config: Option<PatchSettings>,
}

impl ColumnDescriptor {
    /// Denied only by an explicit `allowed: false` on either gate.
    pub fn patch_allowed(&self) -> bool {
        let denied = |gate: &Option<PatchSettings>| gate.as_ref().is_some_and(PatchSettings::denies);
        !(denied(&self.enabled_patch_settings) || denied(&self.supports_columns_config))
    }

    pub fn hashed_or_default(&self) -> bool {
        self.hashed.unwrap_or(false)
    }
}

/// Accept `null`, a boolean, or an object carrying `allowed`. Any other
/// value counts by its truthiness: non-empty strings and arrays, non-zero
/// numbers.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => match map.get("allowed") {
            Some(Value::Bool(b)) => Some(*b),
            // a non-empty object without a verdict is truthy
            _ => Some(!map.is_empty()),
        },
        Some(other) => Some(truthy(&other)),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// `null` and a missing member both mean "no columns".
fn deserialize_columns<'de, D>(deserializer: D) -> Result<IndexMap<String, ColumnDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IndexMap<String, ColumnDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}
