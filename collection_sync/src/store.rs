//! Reads and writes the files the pipeline works on.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use sync_core::{ApiDocs, Collection};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub fn read_api_docs(path: &Path) -> Result<ApiDocs> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    ApiDocs::from_json(&text).map_err(|e| Error::document(path, e))
}

/// Writes the artifact, creating parent directories as needed.
pub fn write_api_docs(path: &Path, docs: &ApiDocs) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let text = docs.to_json().map_err(|e| Error::document(path, e))?;
    write_atomic(path, &text)
}

/// Every `*.json` file directly inside `dir`, sorted by file name.
pub fn collection_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_collection(path: &Path) -> Result<Collection> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Collection::from_json(&text).map_err(|e| Error::document(path, e))
}

/// Replaces the collection file. On error the previous file is left intact.
pub fn write_collection(path: &Path, collection: &Collection) -> Result<()> {
    let text = collection.to_json().map_err(|e| Error::document(path, e))?;
    write_atomic(path, &text)
}

/// Writes `text` to a temporary file beside `path`, then renames it over `path`.
fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    file.write_all(text.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| Error::io(path, e))?;
    file.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
