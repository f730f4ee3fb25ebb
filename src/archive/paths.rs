use anyhow::Result;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub const LOCAL_ARCHIVE_DIR: &str = "ai_transcripts";

/// Filesystem locations the archiver reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePaths {
    pub claude_home: PathBuf,
    pub projects_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub global_archive_dir: PathBuf,
}

impl ArchivePaths {
    /// Default layout rooted at a Claude config directory.
    pub fn under(claude_home: &Path) -> Self {
        Self {
            claude_home: claude_home.to_path_buf(),
            projects_dir: claude_home.join("projects"),
            plans_dir: claude_home.join("plans"),
            global_archive_dir: claude_home.join("transcripts"),
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn claude_home() -> Result<PathBuf> {
    let home = required_home_dir()?;
    Ok(env_or_default_path("CLAUDE_CONFIG_DIR", home.join(".claude")))
}

pub fn resolve_paths() -> Result<ArchivePaths> {
    let defaults = ArchivePaths::under(&claude_home()?);
    Ok(ArchivePaths {
        plans_dir: env_or_default_path("TRANSCRIPT_ARCHIVE_PLANS_DIR", defaults.plans_dir),
        global_archive_dir: env_or_default_path(
            "TRANSCRIPT_ARCHIVE_DIR",
            defaults.global_archive_dir,
        ),
        ..defaults
    })
}

/// Claude Code's project id: the absolute path with every `/` turned into `-`.
pub fn encode_project_path(dir: &Path) -> String {
    dir.display().to_string().replace('/', "-")
}

/// Best-effort inverse of [`encode_project_path`]. Dashes are ambiguous, so
/// segments are matched greedily against directories that actually exist.
pub fn decode_project_path(encoded: &str) -> Option<PathBuf> {
    let rest = encoded.strip_prefix('-')?;
    let naive = PathBuf::from(encoded.replace('-', "/"));
    if naive.exists() {
        return Some(naive);
    }

    let parts = rest.split('-').collect::<Vec<_>>();
    let mut current = PathBuf::from("/");
    let mut i = 0;
    while i < parts.len() {
        let direct = current.join(parts[i]);
        if direct.exists() {
            current = direct;
            i += 1;
            continue;
        }
        let mut combined = parts[i].to_string();
        let mut joined_through = None;
        for (j, part) in parts.iter().enumerate().skip(i + 1) {
            combined = format!("{combined}-{part}");
            if current.join(&combined).exists() {
                joined_through = Some(j);
                break;
            }
        }
        match joined_through {
            Some(j) => {
                current = current.join(&combined);
                i = j + 1;
            }
            None => break,
        }
    }

    (current != Path::new("/") && current.exists()).then_some(current)
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Project directory a transcript belongs to, when it lives under the
/// Claude projects directory and the encoded name can be decoded.
pub fn project_dir_from_transcript(paths: &ArchivePaths, transcript: &Path) -> Option<PathBuf> {
    let resolved = canonical_or_raw(transcript);
    let projects = canonical_or_raw(&paths.projects_dir);
    let rel = resolved.strip_prefix(&projects).ok()?;
    let encoded = match rel.components().next()? {
        Component::Normal(name) => name.to_str()?,
        _ => return None,
    };
    decode_project_path(encoded)
}

/// Expand a leading `~` and anchor relative paths at `cwd`.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    let anchored = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    canonical_or_raw(&anchored)
}

/// Where sessions are archived, by precedence: explicit output directory,
/// then `./ai_transcripts`, then the global base keyed by project.
pub fn archive_root(
    paths: &ArchivePaths,
    cwd: &Path,
    local: bool,
    output: Option<&Path>,
    project_dir: Option<&Path>,
) -> PathBuf {
    if let Some(output) = output {
        return absolutize(output, cwd);
    }
    if local {
        return cwd.join(LOCAL_ARCHIVE_DIR);
    }
    match project_dir {
        Some(dir) => paths
            .global_archive_dir
            .join(encode_project_path(&canonical_or_raw(dir))),
        None => paths.global_archive_dir.clone(),
    }
}

/// Newest `*.jsonl` in the projects entry for `cwd`, with its session id
/// taken from the file stem.
pub fn discover_transcript(paths: &ArchivePaths, cwd: &Path) -> Option<(PathBuf, String)> {
    let project_dir = paths.projects_dir.join(encode_project_path(cwd));
    let entries = fs::read_dir(&project_dir).ok()?;
    let newest = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)?;
    let session_id = newest.file_stem()?.to_string_lossy().into_owned();
    Some((newest, session_id))
}
