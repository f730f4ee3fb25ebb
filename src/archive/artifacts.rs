use crate::archive::event::TranscriptEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const WRITE_TOOLS: &[&str] = &["Write"];
const EDIT_TOOLS: &[&str] = &["Edit", "MultiEdit"];
const READ_TOOLS: &[&str] = &["Read"];

/// Lowercased extension (with dot) to artifact category.
const FILE_TYPES: &[(&str, &str)] = &[
    (".py", "code"),
    (".js", "code"),
    (".ts", "code"),
    (".tsx", "code"),
    (".jsx", "code"),
    (".sh", "code"),
    (".bash", "code"),
    (".r", "code"),
    (".sql", "code"),
    (".go", "code"),
    (".rs", "code"),
    (".java", "code"),
    (".c", "code"),
    (".cpp", "code"),
    (".h", "code"),
    (".hpp", "code"),
    (".md", "document"),
    (".txt", "document"),
    (".rst", "document"),
    (".tex", "document"),
    (".pdf", "document"),
    (".html", "document"),
    (".json", "data"),
    (".csv", "data"),
    (".jsonl", "data"),
    (".geojson", "data"),
    (".xml", "data"),
    (".yaml", "config"),
    (".yml", "config"),
    (".toml", "config"),
    (".ini", "config"),
    (".env", "config"),
    (".png", "image"),
    (".jpg", "image"),
    (".jpeg", "image"),
    (".gif", "image"),
    (".svg", "image"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub created: Vec<ArtifactRef>,
    pub modified: Vec<ArtifactRef>,
    pub referenced: Vec<ArtifactRef>,
}

/// Category for a path based on its extension. Dotfiles such as `.env`
/// have no extension and map to `other`.
pub fn file_type(path: &str) -> &'static str {
    let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
        return "other";
    };
    let dotted = format!(".{}", ext.to_lowercase());
    FILE_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == dotted)
        .map(|(_, kind)| *kind)
        .unwrap_or("other")
}

/// Canonicalize the deepest existing ancestor and re-append the rest, so
/// files deleted during the session still resolve through symlinked roots.
fn canonical_or_raw(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(base) = fs::canonicalize(ancestor) {
            let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return if rest.as_os_str().is_empty() {
                base
            } else {
                base.join(rest)
            };
        }
    }
    path.to_path_buf()
}

/// Express `path` relative to `root` when it lives underneath it; otherwise
/// return it unchanged.
pub fn relativize(path: &str, root: &Path) -> String {
    let resolved = canonical_or_raw(Path::new(path));
    let root = canonical_or_raw(root);
    match resolved.strip_prefix(&root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    }
}

#[derive(Debug, Default)]
struct ToolTouches {
    written: BTreeSet<String>,
    edited: BTreeSet<String>,
    read: BTreeSet<String>,
}

fn scan_touches(events: &[TranscriptEvent]) -> ToolTouches {
    let mut touches = ToolTouches::default();
    for event in events.iter().filter(|e| e.is_assistant()) {
        for tool in event.content.tool_uses() {
            let Some(path) = tool.file_path() else {
                continue;
            };
            let name = tool.name.as_deref().unwrap_or_default();
            let bucket = if WRITE_TOOLS.contains(&name) {
                &mut touches.written
            } else if EDIT_TOOLS.contains(&name) {
                &mut touches.edited
            } else if READ_TOOLS.contains(&name) {
                &mut touches.read
            } else {
                continue;
            };
            bucket.insert(path.to_string());
        }
    }
    touches
}

fn to_refs<'a>(
    paths: impl Iterator<Item = &'a String>,
    project_root: Option<&Path>,
) -> Vec<ArtifactRef> {
    let mut refs = paths
        .map(|path| ArtifactRef {
            path: match project_root {
                Some(root) => relativize(path, root),
                None => path.clone(),
            },
            file_type: file_type(path).to_string(),
        })
        .collect::<Vec<_>>();
    refs.sort_by(|a, b| a.path.cmp(&b.path));
    refs
}

/// Classify files touched by assistant tool calls.
///
/// A written file is always `created`, even if edited afterwards. An edited
/// file that was never written is `modified`. A file that was only read is
/// `referenced`.
pub fn extract_artifacts(events: &[TranscriptEvent], project_root: Option<&Path>) -> ArtifactSet {
    let touches = scan_touches(events);

    let created = touches.written.iter();
    let modified = touches.edited.difference(&touches.written);
    let referenced = touches
        .read
        .iter()
        .filter(|p| !touches.edited.contains(*p) && !touches.written.contains(*p));

    ArtifactSet {
        created: to_refs(created, project_root),
        modified: to_refs(modified, project_root),
        referenced: to_refs(referenced, project_root),
    }
}
