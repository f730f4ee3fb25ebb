use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const PLANS_SUBDIR: &str = "plans";

/// Markdown plan files in `plans_dir`, sorted by name. A missing directory
/// yields none.
pub fn find_plan_files(plans_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(plans_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", plans_dir.display()));
        }
    };
    let mut plans = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            plans.push(path);
        }
    }
    plans.sort();
    Ok(plans)
}

/// Copy every plan into `<session_dir>/plans/` and return the copied names.
pub fn copy_plan_files(plans_dir: &Path, session_dir: &Path) -> Result<Vec<String>> {
    let plans = find_plan_files(plans_dir)?;
    if plans.is_empty() {
        return Ok(Vec::new());
    }
    let dest_dir = session_dir.join(PLANS_SUBDIR);
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut names = Vec::with_capacity(plans.len());
    for plan in plans {
        let Some(name) = plan.file_name() else {
            continue;
        };
        let dest = dest_dir.join(name);
        fs::copy(&plan, &dest).with_context(|| {
            format!("failed to copy {} to {}", plan.display(), dest.display())
        })?;
        names.push(name.to_string_lossy().into_owned());
    }
    Ok(names)
}
