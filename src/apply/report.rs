use serde::Serialize;
use std::path::PathBuf;

/// A table whose patch failed or could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableError {
    pub table: String,
    /// HTTP status, when the service answered at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Raw response body or failure text.
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnError {
    pub table: String,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

/// A descriptor file that could not be loaded; none of its patches ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one apply run. Non-empty error lists signal partial failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub table_errors: Vec<TableError>,
    pub column_errors: Vec<ColumnError>,
    pub file_errors: Vec<FileError>,
    pub tables_patched: usize,
    pub columns_patched: usize,
    pub columns_skipped: usize,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.table_errors.is_empty() && self.column_errors.is_empty() && self.file_errors.is_empty()
    }

    /// Fold one file's results into the run total.
    pub fn merge(&mut self, other: ApplyReport) {
        self.table_errors.extend(other.table_errors);
        self.column_errors.extend(other.column_errors);
        self.file_errors.extend(other.file_errors);
        self.tables_patched += other.tables_patched;
        self.columns_patched += other.columns_patched;
        self.columns_skipped += other.columns_skipped;
    }
}
