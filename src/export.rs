// src/export.rs

use indexmap::IndexMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use crate::client::types::{RemoteColumn, RemoteTable};
use crate::client::SchemaClient;
use crate::descriptor::{write_descriptor, ColumnDescriptor, TableDescriptor};
use crate::error::{Result, SyncError};

/// Reload the connection's schema and write one `<table>.json` per table into
/// `folder`, replacing existing files. Any failed fetch aborts the export.
#[instrument(level = "info", skip(client, folder), fields(folder = %folder.as_ref().display()))]
pub async fn save_table_configs<P: AsRef<Path>>(
    client: &SchemaClient,
    connection_id: &str,
    folder: P,
) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref();
    fs::create_dir_all(folder).map_err(|e| SyncError::io(folder, e))?;

    client.reload_schema_or_warn(connection_id).await;
    let config = client.get_connection_schema(connection_id).await?;

    let mut written = Vec::new();
    for (schema_name, schema) in &config.schemas {
        if schema.name_in_destination.as_deref().map_or(true, str::is_empty) {
            debug!(schema_name = %schema_name, "no destination name, skipping schema");
            continue;
        }

        for (table_name, table) in &schema.tables {
            let mut descriptor = table_descriptor(table_name, table);

            if table.supports_columns_config == Some(true) {
                if let Some(columns) = client
                    .get_table_columns_config(connection_id, schema_name, table_name)
                    .await?
                {
                    descriptor.columns = column_descriptors(columns);
                }
            }

            let path = write_descriptor(folder, table_name, &descriptor)?;
            info!(table = %table_name, path = %path.display(), "saved table config");
            written.push(path);
        }
    }

    info!(tables = written.len(), "export complete");
    Ok(written)
}

fn table_descriptor(table_name: &str, table: &RemoteTable) -> TableDescriptor {
    TableDescriptor {
        table: Some(table_name.to_string()),
        sync_mode: table.sync_mode.clone(),
        enabled: table.enabled,
        enabled_patch_settings: table.enabled_patch_settings.as_ref().and_then(|s| s.allowed),
        supports_columns_config: table.supports_columns_config,
        columns: IndexMap::new(),
    }
}

fn column_descriptors(columns: IndexMap<String, RemoteColumn>) -> IndexMap<String, ColumnDescriptor> {
    columns
        .into_iter()
        .map(|(name, col)| {
            let descriptor = ColumnDescriptor {
                name_in_destination: col.name_in_destination,
                enabled: col.enabled,
                hashed: col.hashed,
                is_primary_key: col.is_primary_key,
                enabled_patch_settings: col.enabled_patch_settings,
                supports_columns_config: None,
            };
            (name, descriptor)
        })
        .collect()
}
