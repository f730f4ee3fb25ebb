//! Whole-file JSON persistence for the per-root session manifest.
//!
//! Files are rewritten in full on every save. A file that cannot be parsed
//! is treated as absent so a torn write never blocks future archiving.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = ".session_manifest.json";

/// Session id to absolute archive directory.
pub type SessionManifest = BTreeMap<String, String>;

/// Read and parse `path`, or `None` when it is missing or unparseable.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    Ok(serde_json::from_slice(&raw).ok())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn manifest_path(archive_root: &Path) -> PathBuf {
    archive_root.join(MANIFEST_FILE)
}

pub fn load_manifest(archive_root: &Path) -> Result<SessionManifest> {
    Ok(read_json(&manifest_path(archive_root))?.unwrap_or_default())
}

pub fn save_manifest(archive_root: &Path, manifest: &SessionManifest) -> Result<PathBuf> {
    let file = manifest_path(archive_root);
    write_json(&file, manifest)?;
    Ok(file)
}
