use crate::archive::artifacts::ArtifactSet;
use crate::archive::relationships::RelationshipHints;
use crate::archive::stats::{SessionStats, TokenTotals, ToolCallCounts, estimate_cost};
use crate::archive::util::now_local_iso;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1.0";
pub const METADATA_FILE: &str = "session.meta.json";
pub const RAW_TRANSCRIPT_FILE: &str = "raw-transcript.jsonl";
const HASH_CHUNK_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub model_id: String,
    pub claude_code_version: Option<String>,
    pub access_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub turns: u64,
    pub human_messages: u64,
    pub assistant_messages: u64,
    pub thinking_blocks: u64,
    pub tool_calls: ToolCallCounts,
    pub tokens: TokenTotals,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationships {
    pub continues: Option<String>,
    pub references: Vec<String>,
    #[serde(rename = "isPartOf")]
    pub is_part_of: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoGenerated {
    pub title: String,
    pub purpose: String,
    pub tags: Vec<String>,
}

/// Prompt / process / provenance summary supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreePs {
    pub prompt_summary: String,
    pub process_summary: String,
    pub provenance_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub archived_at: String,
    pub directory_name: String,
    pub jsonl_path: String,
    pub jsonl_sha256: String,
    pub jsonl_bytes: u64,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub schema_version: String,
    pub session: SessionInfo,
    pub project: ProjectInfo,
    pub model: ModelInfo,
    pub statistics: Statistics,
    pub artifacts: ArtifactSet,
    pub relationships: Relationships,
    pub auto_generated: AutoGenerated,
    pub three_ps: ThreePs,
    pub plan_files: Vec<String>,
    pub archive: ArchiveInfo,
    /// Raw detector output kept for human review; not part of the stable schema.
    #[serde(
        rename = "_relationship_hints",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship_hints: Option<RelationshipHints>,
}

#[derive(Debug, Clone)]
pub struct MetadataInput<'a> {
    pub session_id: &'a str,
    /// Archived copy of the transcript; hash and size describe this file.
    pub raw_copy: &'a Path,
    pub stats: &'a SessionStats,
    pub title: &'a str,
    pub artifacts: &'a ArtifactSet,
    pub relationships: &'a RelationshipHints,
    pub plan_files: &'a [String],
    pub directory_name: &'a str,
    pub three_ps: Option<&'a ThreePs>,
    pub needs_review: bool,
    pub project_dir: Option<&'a Path>,
}

/// SHA-256 of a file, read in fixed-size chunks.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_BYTES];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn build_metadata(input: &MetadataInput<'_>) -> Result<SessionMetadata> {
    let jsonl_sha256 = file_sha256(input.raw_copy)?;
    let jsonl_bytes = fs::metadata(input.raw_copy)
        .with_context(|| format!("failed to stat {}", input.raw_copy.display()))?
        .len();
    let stats = input.stats;
    let project_name = input
        .project_dir
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    let relationship_hints = if input.relationships.detection_notes.is_empty() {
        None
    } else {
        Some(input.relationships.clone())
    };

    Ok(SessionMetadata {
        schema_version: SCHEMA_VERSION.to_string(),
        session: SessionInfo {
            id: input.session_id.to_string(),
            started_at: stats.started_at.clone(),
            ended_at: stats.ended_at.clone(),
            duration_minutes: stats.duration_minutes,
        },
        project: ProjectInfo {
            name: project_name.clone(),
            directory: input.project_dir.map(|dir| dir.display().to_string()),
        },
        model: ModelInfo {
            provider: "anthropic".to_string(),
            model_id: stats.model.clone().unwrap_or_else(|| "unknown".to_string()),
            claude_code_version: stats.tool_version.clone(),
            access_method: "claude-code-cli".to_string(),
        },
        statistics: Statistics {
            turns: stats.turns,
            human_messages: stats.human_messages,
            assistant_messages: stats.assistant_messages,
            thinking_blocks: stats.thinking_blocks,
            tool_calls: stats.tool_calls.clone(),
            tokens: stats.tokens,
            estimated_cost_usd: estimate_cost(&stats.tokens),
        },
        artifacts: input.artifacts.clone(),
        relationships: Relationships {
            continues: input.relationships.continues_hint.clone(),
            references: input.relationships.references_hints.clone(),
            is_part_of: project_name.into_iter().collect(),
        },
        auto_generated: AutoGenerated {
            title: input.title.to_string(),
            purpose: String::new(),
            tags: Vec::new(),
        },
        three_ps: input.three_ps.cloned().unwrap_or_default(),
        plan_files: input.plan_files.to_vec(),
        archive: ArchiveInfo {
            archived_at: now_local_iso(),
            directory_name: input.directory_name.to_string(),
            jsonl_path: RAW_TRANSCRIPT_FILE.to_string(),
            jsonl_sha256,
            jsonl_bytes,
            needs_review: input.needs_review,
        },
        relationship_hints,
    })
}

/// `<transcript>.meta.json`, next to the source transcript.
pub fn sidecar_path(transcript_path: &Path) -> PathBuf {
    let mut name = transcript_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".meta.json");
    transcript_path.with_file_name(name)
}

/// Write metadata into the session directory, then best-effort beside the
/// source transcript. A permission failure on the sidecar is ignored.
pub fn write_metadata(
    session_dir: &Path,
    transcript_path: &Path,
    metadata: &SessionMetadata,
) -> Result<PathBuf> {
    let data = serde_json::to_string_pretty(metadata)?;
    let archive_copy = session_dir.join(METADATA_FILE);
    fs::write(&archive_copy, &data)
        .with_context(|| format!("failed to write {}", archive_copy.display()))?;

    let sidecar = sidecar_path(transcript_path);
    match fs::write(&sidecar, &data) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to write {}", sidecar.display()));
        }
    }
    Ok(archive_copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::artifacts::extract_artifacts;
    use crate::archive::event::parse_transcript;
    use crate::archive::relationships::detect_relationships;
    use crate::archive::stats::collect_stats;
    use serde_json::json;
    use tempfile::tempdir;

    const SAMPLE: &str = concat!(
        r#"{"type":"user","timestamp":"2026-01-14T10:00:00.000Z","message":{"role":"user","content":"Thanks! This continues from session abc12345-1234-1234-1234-123456789abc"}}"#,
        "\n",
        r#"{"type":"assistant","timestamp":"2026-01-14T10:05:00.000Z","message":{"role":"assistant","model":"claude-sonnet-4","content":[{"type":"tool_use","name":"Write","input":{"file_path":"/home/user/project/new.py"}}]}}"#,
        "\n"
    );

    #[test]
    fn sha256_matches_known_digest() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("t.jsonl");
        fs::write(&path, "hello").expect("write");
        assert_eq!(
            file_sha256(&path).expect("hash"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn sha256_streams_multi_chunk_files() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("big.jsonl");
        let body = "x".repeat(HASH_CHUNK_BYTES * 3 + 17);
        fs::write(&path, &body).expect("write");
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        assert_eq!(
            file_sha256(&path).expect("hash"),
            format!("{:x}", hasher.finalize())
        );
    }

    #[test]
    fn builds_full_record() {
        let tmp = tempdir().expect("tempdir");
        let transcript = tmp.path().join("session.jsonl");
        fs::write(&transcript, SAMPLE).expect("write");
        let events = parse_transcript(SAMPLE);
        let stats = collect_stats(&events);
        let artifacts = extract_artifacts(&events, None);
        let hints = detect_relationships(&events);
        let three_ps = ThreePs {
            prompt_summary: "p".to_string(),
            process_summary: "q".to_string(),
            provenance_summary: "r".to_string(),
        };
        let plans = vec!["plan.md".to_string()];
        let project = PathBuf::from("/home/user/project");

        let meta = build_metadata(&MetadataInput {
            session_id: "test-session-123",
            raw_copy: &transcript,
            stats: &stats,
            title: "Test Title",
            artifacts: &artifacts,
            relationships: &hints,
            plan_files: &plans,
            directory_name: "2026-01-14-test",
            three_ps: Some(&three_ps),
            needs_review: false,
            project_dir: Some(&project),
        })
        .expect("metadata");

        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.session.id, "test-session-123");
        assert_eq!(meta.session.duration_minutes, 5);
        assert_eq!(meta.project.name.as_deref(), Some("project"));
        assert_eq!(meta.model.model_id, "claude-sonnet-4");
        assert_eq!(meta.auto_generated.title, "Test Title");
        assert_eq!(meta.relationships.is_part_of, vec!["project"]);
        assert_eq!(
            meta.relationships.references,
            vec!["abc12345-1234-1234-1234-123456789abc"]
        );
        assert_eq!(meta.three_ps, three_ps);
        assert_eq!(meta.plan_files, plans);
        assert!(!meta.archive.needs_review);
        assert_eq!(meta.archive.jsonl_bytes, SAMPLE.len() as u64);
        assert_eq!(meta.artifacts.created.len(), 1);
        assert!(meta.relationship_hints.is_some());

        let value = serde_json::to_value(&meta).expect("serialize");
        assert!(value.get("_relationship_hints").is_some());
        assert_eq!(value["relationships"]["isPartOf"], json!(["project"]));
        assert_eq!(value["artifacts"]["created"][0]["type"], json!("code"));
    }

    #[test]
    fn record_without_project_or_summary() {
        let tmp = tempdir().expect("tempdir");
        let transcript = tmp.path().join("session.jsonl");
        fs::write(&transcript, "{\"type\":\"user\",\"message\":{\"content\":\"hi\"}}\n")
            .expect("write");
        let stats = SessionStats::default();
        let meta = build_metadata(&MetadataInput {
            session_id: "s",
            raw_copy: &transcript,
            stats: &stats,
            title: "Untitled Session",
            artifacts: &ArtifactSet::default(),
            relationships: &RelationshipHints::default(),
            plan_files: &[],
            directory_name: "d",
            three_ps: None,
            needs_review: true,
            project_dir: None,
        })
        .expect("metadata");

        assert!(meta.project.name.is_none());
        assert!(meta.relationships.is_part_of.is_empty());
        assert_eq!(meta.model.model_id, "unknown");
        assert_eq!(meta.three_ps, ThreePs::default());
        assert!(meta.relationship_hints.is_none());
        let value = serde_json::to_value(&meta).expect("serialize");
        assert!(value.get("_relationship_hints").is_none());
    }

    #[test]
    fn writes_archive_copy_and_sidecar() {
        let tmp = tempdir().expect("tempdir");
        let session_dir = tmp.path().join("archive");
        fs::create_dir_all(&session_dir).expect("mkdir");
        let transcript = tmp.path().join("transcript.jsonl");
        fs::write(&transcript, SAMPLE).expect("write");
        let stats = collect_stats(&parse_transcript(SAMPLE));
        let meta = build_metadata(&MetadataInput {
            session_id: "s",
            raw_copy: &transcript,
            stats: &stats,
            title: "T",
            artifacts: &ArtifactSet::default(),
            relationships: &RelationshipHints::default(),
            plan_files: &[],
            directory_name: "d",
            three_ps: None,
            needs_review: true,
            project_dir: None,
        })
        .expect("metadata");

        let written = write_metadata(&session_dir, &transcript, &meta).expect("write meta");
        assert_eq!(written, session_dir.join(METADATA_FILE));
        let sidecar = tmp.path().join("transcript.jsonl.meta.json");
        assert_eq!(sidecar, sidecar_path(&transcript));
        let loaded: SessionMetadata =
            serde_json::from_str(&fs::read_to_string(&sidecar).expect("read")).expect("parse");
        assert_eq!(loaded, meta);
    }
}
