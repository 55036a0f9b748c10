//! Scoped single-file operations.
//!
//! Every artifact is one JSON value in one UTF-8 file. Writes go through a
//! temp file in the same directory followed by a rename, with a best-effort
//! `sync_all` in between; that is the extent of the engine's atomicity.
//! Missing-file and collision io errors are mapped to the typed
//! [`StorageError`](crate::error::StorageError) kinds so callers can
//! distinguish "blob not found" from a real I/O failure.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;

use eyre::{Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{already_exists, not_found};

/// Reads and deserializes a whole JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(not_found(path.display().to_string()));
        }
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("failed to read '{}'", path.display()));
        }
    };
    serde_json::from_slice(&bytes)
        .wrap_err_with(|| format!("failed to parse '{}'", path.display()))
}

/// Serializes and writes a whole JSON file, replacing any existing content.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .wrap_err_with(|| format!("failed to serialize '{}'", path.display()))?;
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)
        .wrap_err_with(|| format!("failed to create '{}'", tmp.display()))?;
    file.write_all(&bytes)
        .wrap_err_with(|| format!("failed to write '{}'", tmp.display()))?;
    // best-effort durability; a failed flush is not worth failing the write
    let _ = file.sync_all();
    drop(file);
    fs::rename(&tmp, path)
        .wrap_err_with(|| format!("failed to replace '{}'", path.display()))
}

/// Writes a fresh JSON file, failing with `AlreadyExists` on collision.
pub fn create_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if path.exists() {
        return Err(already_exists(path.display().to_string()));
    }
    write_json(path, value)
}

pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(not_found(path.display().to_string()))
        }
        Err(err) => {
            Err(err).wrap_err_with(|| format!("failed to remove '{}'", path.display()))
        }
    }
}

pub fn create_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(already_exists(path.display().to_string()))
        }
        Err(err) => {
            Err(err).wrap_err_with(|| format!("failed to create directory '{}'", path.display()))
        }
    }
}

pub fn remove_dir_all(path: &Path) -> Result<()> {
    fs::remove_dir_all(path)
        .wrap_err_with(|| format!("failed to remove directory '{}'", path.display()))
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// File names inside a directory, sorted for deterministic iteration.
pub fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(not_found(dir.display().to_string()));
        }
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("failed to list '{}'", dir.display()));
        }
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry =
            entry.wrap_err_with(|| format!("failed to list '{}'", dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}
