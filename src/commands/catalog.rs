use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::archive::catalog::{Catalog, CatalogEntry, load_catalog};
use crate::archive::paths::{archive_root, resolve_paths};
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    pub local: bool,
    pub output: Option<PathBuf>,
    pub json: bool,
}

fn entry_line(entry: &CatalogEntry) -> String {
    let started = entry.started_at.as_deref().unwrap_or("-");
    let review = if entry.needs_review { " [needs review]" } else { "" };
    format!(
        "{started} {} ({} min) {}{review}",
        entry.directory, entry.duration_minutes, entry.title
    )
}

/// Catalog of the archive root the archive command would use from the
/// current directory. A root with no catalog yields an empty one.
pub fn load(opts: &CatalogOptions) -> Result<Catalog> {
    let paths = resolve_paths()?;
    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let project = if opts.local { None } else { Some(cwd.as_path()) };
    let root = archive_root(&paths, &cwd, opts.local, opts.output.as_deref(), project);
    load_catalog(&root)
}

pub fn run(opts: &CatalogOptions) -> Result<CommandReport> {
    let catalog = load(opts)?;
    let mut report = CommandReport::new("catalog");
    report.detail(format!("archive_root={}", catalog.archive_location));
    report.detail(format!("total_sessions={}", catalog.sessions.len()));
    report.detail(format!(
        "needs_review={}",
        catalog.sessions.iter().filter(|s| s.needs_review).count()
    ));
    for entry in &catalog.sessions {
        report.detail(entry_line(entry));
    }
    Ok(report)
}
