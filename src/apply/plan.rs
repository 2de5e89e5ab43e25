//! Decides, without touching the network, which patches a descriptor asks for.

use crate::client::types::{ColumnPatch, TablePatch};
use crate::descriptor::TableDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStep {
    /// `enabled_patch_settings` is not truthy.
    Skip,
    Patch(TablePatch),
    /// A patch is due but the descriptor cannot express it.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnStep {
    Patch { column: String, patch: ColumnPatch },
    /// The column's capability gate says `allowed: false`.
    Denied { column: String },
    Invalid { column: String, message: String },
}

/// Every call the applier will make for one descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    pub table: String,
    pub table_step: TableStep,
    /// Empty when the descriptor has no columns.
    pub column_steps: Vec<ColumnStep>,
    /// Columns are listed although the table says it has no column config.
    pub columns_unsupported: bool,
}

impl TablePlan {
    pub fn build(table: &str, descriptor: &TableDescriptor) -> Self {
        let table_step = if !descriptor.table_patch_allowed() {
            TableStep::Skip
        } else {
            match descriptor.enabled {
                Some(enabled) => TableStep::Patch(TablePatch {
                    enabled,
                    sync_mode: descriptor.sync_mode.clone().filter(|m| !m.is_empty()),
                }),
                None => TableStep::Invalid("descriptor has no `enabled` value".to_string()),
            }
        };

        // Gated on the presence of columns alone; supports_columns_config is advisory.
        let column_steps = descriptor
            .columns
            .iter()
            .map(|(name, col)| {
                let column = name.clone();
                if !col.patch_allowed() {
                    return ColumnStep::Denied { column };
                }
                match col.enabled {
                    Some(enabled) => ColumnStep::Patch {
                        column,
                        patch: ColumnPatch {
                            enabled,
                            hashed: col.hashed_or_default(),
                        },
                    },
                    None => ColumnStep::Invalid {
                        column,
                        message: "column has no `enabled` value".to_string(),
                    },
                }
            })
            .collect();

        Self {
            table: table.to_string(),
            table_step,
            column_steps,
            columns_unsupported: !descriptor.columns.is_empty()
                && descriptor.supports_columns_config == Some(false),
        }
    }

    /// Number of remote calls this plan issues.
    pub fn call_count(&self) -> usize {
        let table = usize::from(matches!(self.table_step, TableStep::Patch(_)));
        let columns = self
            .column_steps
            .iter()
            .filter(|s| matches!(s, ColumnStep::Patch { .. }))
            .count();
        table + columns
    }
}
