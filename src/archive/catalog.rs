use crate::archive::metadata::{SCHEMA_VERSION, SessionMetadata};
use crate::archive::store::{read_json, write_json};
use crate::archive::util::now_local_iso;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "CATALOG.json";

fn default_needs_review() -> bool {
    true
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Listing summary of one archived session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub duration_minutes: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_needs_review")]
    pub needs_review: bool,
}

impl CatalogEntry {
    pub fn from_metadata(meta: &SessionMetadata) -> Self {
        Self {
            id: meta.session.id.clone(),
            directory: meta.archive.directory_name.clone(),
            title: meta.auto_generated.title.clone(),
            purpose: meta.auto_generated.purpose.clone(),
            started_at: meta.session.started_at.clone(),
            duration_minutes: meta.session.duration_minutes,
            tags: meta.auto_generated.tags.clone(),
            needs_review: meta.archive.needs_review,
        }
    }

    fn sort_key(&self) -> &str {
        self.started_at.as_deref().unwrap_or("")
    }
}

/// `total_sessions` and `needs_review_count` are derived from `sessions`
/// on every save and never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub archive_location: String,
    #[serde(default)]
    pub total_sessions: usize,
    #[serde(default)]
    pub needs_review_count: usize,
    #[serde(default)]
    pub sessions: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn empty(archive_root: &Path) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: None,
            archive_location: archive_root.display().to_string(),
            total_sessions: 0,
            needs_review_count: 0,
            sessions: Vec::new(),
        }
    }

    fn recount(&mut self) {
        self.total_sessions = self.sessions.len();
        self.needs_review_count = self.sessions.iter().filter(|s| s.needs_review).count();
    }

    /// Replace the entry with the same id, or append; then order newest first.
    /// Entries without a start time sort last.
    pub fn upsert(&mut self, entry: CatalogEntry) {
        match self.sessions.iter_mut().find(|s| s.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.sessions.push(entry),
        }
        self.sessions.sort_by(|a, b| b.sort_key().cmp(a.sort_key()));
    }
}

pub fn catalog_path(archive_root: &Path) -> PathBuf {
    archive_root.join(CATALOG_FILE)
}

/// Missing summary fields are tolerated; they are recomputed on save.
pub fn load_catalog(archive_root: &Path) -> Result<Catalog> {
    let mut catalog: Catalog = read_json(&catalog_path(archive_root))?
        .unwrap_or_else(|| Catalog::empty(archive_root));
    if catalog.archive_location.is_empty() {
        catalog.archive_location = archive_root.display().to_string();
    }
    Ok(catalog)
}

pub fn save_catalog(archive_root: &Path, catalog: &mut Catalog) -> Result<PathBuf> {
    catalog.recount();
    catalog.generated_at = Some(now_local_iso());
    let file = catalog_path(archive_root);
    write_json(&file, catalog)?;
    Ok(file)
}

pub fn update_catalog(archive_root: &Path, meta: &SessionMetadata) -> Result<Catalog> {
    let mut catalog = load_catalog(archive_root)?;
    catalog.upsert(CatalogEntry::from_metadata(meta));
    save_catalog(archive_root, &mut catalog)?;
    Ok(catalog)
}
