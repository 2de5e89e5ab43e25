use glob::{glob, Pattern};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::warn;

use super::TableDescriptor;
use crate::error::{Result, SyncError};

/// A `<table>.json` file found in a descriptor folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub table: String,
    pub path: PathBuf,
}

/// Path of the descriptor for `table` inside `dir`.
pub fn descriptor_path<P: AsRef<Path>>(dir: P, table: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.json", table))
}

/// Every regular `*.json` file directly inside `dir`, sorted by table name.
pub fn list_descriptor_files<P: AsRef<Path>>(dir: P) -> Result<Vec<DescriptorFile>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SyncError::io(
            dir,
            io::Error::new(io::ErrorKind::NotFound, "descriptor folder does not exist"),
        ));
    }

    let pattern = format!("{}/*.json", Pattern::escape(&dir.to_string_lossy()));
    let entries = glob(&pattern)
        .map_err(|e| SyncError::io(dir, io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "cannot read descriptor folder entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let table = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => continue,
        };
        files.push(DescriptorFile { table, path });
    }
    files.sort_by(|a, b| a.table.cmp(&b.table));
    Ok(files)
}

/// Load one descriptor. Unreadable or malformed files are reported as
/// [`SyncError::Validation`] for that file alone.
pub fn read_descriptor<P: AsRef<Path>>(path: P) -> Result<TableDescriptor> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| SyncError::validation(path, e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| SyncError::validation(path, e.to_string()))
}

/// Write `<dir>/<table>.json` pretty-printed, replacing any previous file.
pub fn write_descriptor<P: AsRef<Path>>(
    dir: P,
    table: &str,
    descriptor: &TableDescriptor,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let path = descriptor_path(dir, table);

    // Write to a hidden tmp file, then rename over the original
    let tmp_path = dir.join(format!(".{}.json.tmp", table));
    replace_file(&tmp_path, &path, |f| {
        serde_json::to_writer_pretty(&mut *f, descriptor)?;
        f.write_all(b"\n").map_err(|e| SyncError::io(&tmp_path, e))
    })?;
    Ok(path)
}

/// Fill `tmp_path` with `fill`, then rename it to `path`. The tmp file is
/// removed again when filling or renaming fails.
fn replace_file<F>(tmp_path: &Path, path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let written = fs::File::create(tmp_path)
        .map_err(|e| SyncError::io(tmp_path, e))
        .and_then(|mut tmp| fill(&mut tmp))
        .and_then(|()| fs::rename(tmp_path, path).map_err(|e| SyncError::io(path, e)));
    if written.is_err() {
        if let Err(e) = fs::remove_file(tmp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %e, "could not remove tmp file");
            }
        }
    }
    written
}
