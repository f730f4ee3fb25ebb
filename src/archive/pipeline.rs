//! End-to-end archiving of one session.
//!
//! A session moves through [`ArchiveState`]: unknown sessions are archived
//! in full, known sessions whose transcript size is unchanged are left
//! alone, and changed, forced or retitled sessions are re-archived in place.
//! External tools only ever degrade their own output.

use crate::archive::artifacts::extract_artifacts;
use crate::archive::catalog::update_catalog;
use crate::archive::config::ArchiveConfig;
use crate::archive::event::{TranscriptEvent, parse_transcript};
use crate::archive::export::{
    MARKDOWN_FILE, PDF_FILE, export_pdf, extract_conversation, render_markdown,
};
use crate::archive::lock::{ArchiveLock, DEFAULT_LOCK_TIMEOUT};
use crate::archive::metadata::{
    MetadataInput, RAW_TRANSCRIPT_FILE, ThreePs, build_metadata, write_metadata,
};
use crate::archive::paths::{ArchivePaths, project_dir_from_transcript};
use crate::archive::plans::copy_plan_files;
use crate::archive::relationships::detect_relationships;
use crate::archive::render::{first_missing_renderer_report, patch_html_titles, render_html};
use crate::archive::stats::collect_stats;
use crate::archive::store::{SessionManifest, load_manifest, save_manifest};
use crate::archive::title::{generate_title, sanitize_filename, slugify};
use crate::archive::util::today_local;
use crate::archive::warn::{self, WarnLine};
use crate::error::{ArchiveErrorCode, ExternalToolError};
use crate::logging::Logger;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const TITLE_MARKER: &str = ".title";
pub const SIZE_MARKER: &str = ".last_size";
const SESSION_PREFIX_CHARS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct ArchiveRequest {
    pub session_id: String,
    pub transcript: PathBuf,
    pub archive_root: PathBuf,
    pub force: bool,
    pub retitle: bool,
    pub title: Option<String>,
    pub three_ps: Option<ThreePs>,
    /// Confirmed predecessor session, recorded as `relationships.continues`.
    pub continues: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveContext<'a> {
    pub paths: &'a ArchivePaths,
    pub config: &'a ArchiveConfig,
    pub logger: Logger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    NotArchived,
    ArchivedUnchanged,
    ArchivedChanged,
    Retitled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { dir: PathBuf, state: ArchiveState },
    Unchanged { dir: PathBuf },
    MissingTranscript,
    EmptyTranscript,
}

impl ArchiveOutcome {
    /// Directory written by this run, if any.
    pub fn archived_dir(&self) -> Option<&Path> {
        match self {
            Self::Archived { dir, .. } => Some(dir),
            _ => None,
        }
    }
}

fn read_size_marker(dir: &Path) -> Option<u64> {
    fs::read_to_string(dir.join(SIZE_MARKER))
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn classify(request: &ArchiveRequest, existing: Option<&Path>, size: u64) -> ArchiveState {
    let Some(dir) = existing else {
        return ArchiveState::NotArchived;
    };
    if request.retitle {
        return ArchiveState::Retitled;
    }
    if request.force {
        return ArchiveState::ArchivedChanged;
    }
    match read_size_marker(dir) {
        Some(last) if last == size => ArchiveState::ArchivedUnchanged,
        _ => ArchiveState::ArchivedChanged,
    }
}

fn directory_stem(title: &str, session_id: &str) -> String {
    let slug = slugify(title);
    if !slug.is_empty() {
        return slug;
    }
    let prefix = session_id.chars().take(SESSION_PREFIX_CHARS).collect::<String>();
    if prefix.is_empty() {
        sanitize_filename(title)
    } else {
        prefix
    }
}

fn directory_taken(
    candidate: &Path,
    manifest: &SessionManifest,
    session_id: &str,
    own: Option<&Path>,
) -> bool {
    if own == Some(candidate) {
        return false;
    }
    let candidate_str = candidate.display().to_string();
    let owned_by_other = manifest
        .iter()
        .any(|(id, dir)| id != session_id && *dir == candidate_str);
    owned_by_other || candidate.exists()
}

/// `YYYY-MM-DD-<slug>`, suffixed with the session-id prefix (and then a
/// counter) while the name belongs to another session or is already on disk.
/// `own` is the session's current directory, which never counts as taken.
fn fresh_directory(
    archive_root: &Path,
    manifest: &SessionManifest,
    session_id: &str,
    title: &str,
    own: Option<&Path>,
) -> PathBuf {
    let name = format!("{}-{}", today_local(), directory_stem(title, session_id));
    let candidate = archive_root.join(&name);
    if !directory_taken(&candidate, manifest, session_id, own) {
        return candidate;
    }
    let prefix = session_id.chars().take(SESSION_PREFIX_CHARS).collect::<String>();
    let suffixed = format!("{name}-{prefix}");
    let mut candidate = archive_root.join(&suffixed);
    let mut counter = 2;
    while directory_taken(&candidate, manifest, session_id, own) {
        candidate = archive_root.join(format!("{suffixed}-{counter}"));
        counter += 1;
    }
    candidate
}

fn resolve_title(
    request: &ArchiveRequest,
    state: ArchiveState,
    existing: Option<&Path>,
    events: &[TranscriptEvent],
) -> String {
    if let Some(title) = request.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    if state == ArchiveState::ArchivedChanged {
        if let Some(stored) = existing
            .and_then(|dir| fs::read_to_string(dir.join(TITLE_MARKER)).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
        {
            return stored;
        }
    }
    generate_title(events)
}

fn run_renderer(ctx: &ArchiveContext<'_>, request: &ArchiveRequest, dir: &Path, title: &str) {
    if !ctx.config.renderer.enabled {
        return;
    }
    match render_html(&ctx.config.renderer, &request.transcript, dir) {
        Ok(()) => {}
        Err(err @ ExternalToolError::Missing { .. }) => {
            if first_missing_renderer_report() {
                ctx.logger.error(&err);
            }
        }
        Err(err) => warn::emit_tool_failure(
            &ctx.logger,
            "render",
            &request.session_id,
            "HTML rendering failed",
            &err,
        ),
    }
    if let Err(err) = patch_html_titles(dir, title) {
        warn::emit(
            &ctx.logger,
            WarnLine {
                code: ArchiveErrorCode::W004HtmlPatch,
                stage: "render",
                action: "skipped",
                session: &request.session_id,
                reason: "html title patch failed",
                err: &format!("{err:#}"),
            },
        );
    }
}

fn copy_plans(ctx: &ArchiveContext<'_>, session_id: &str, dir: &Path) -> Vec<String> {
    match copy_plan_files(&ctx.paths.plans_dir, dir) {
        Ok(names) => names,
        Err(err) => {
            ctx.logger.warn(format!("plan files not copied: {err:#}"));
            warn::emit(
                &ctx.logger,
                WarnLine {
                    code: ArchiveErrorCode::W005PlanCopy,
                    stage: "plans",
                    action: "skipped",
                    session: session_id,
                    reason: "plan copy failed",
                    err: &format!("{err:#}"),
                },
            );
            Vec::new()
        }
    }
}

/// Archive one session. Missing or empty transcripts are logged and
/// reported through the outcome rather than as errors.
pub fn archive_session(ctx: &ArchiveContext<'_>, request: &ArchiveRequest) -> Result<ArchiveOutcome> {
    let logger = &ctx.logger;
    let bytes = match fs::read(&request.transcript) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            logger.error(format!("Transcript not found: {}", request.transcript.display()));
            return Ok(ArchiveOutcome::MissingTranscript);
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read {}", request.transcript.display()));
        }
    };
    let content = String::from_utf8_lossy(&bytes).into_owned();
    if content.trim().is_empty() {
        logger.error(format!("Transcript is empty: {}", request.transcript.display()));
        return Ok(ArchiveOutcome::EmptyTranscript);
    }
    let size = bytes.len() as u64;

    let _lock = ArchiveLock::acquire(&request.archive_root, DEFAULT_LOCK_TIMEOUT)?;
    let mut manifest = load_manifest(&request.archive_root)?;
    let existing = manifest.get(&request.session_id).map(PathBuf::from);
    let state = classify(request, existing.as_deref(), size);
    if state == ArchiveState::ArchivedUnchanged {
        if let Some(dir) = existing {
            return Ok(ArchiveOutcome::Unchanged { dir });
        }
    }

    let events = parse_transcript(&content);
    let title = resolve_title(request, state, existing.as_deref(), &events);
    let dir = match (state, existing) {
        (ArchiveState::ArchivedChanged, Some(dir)) => dir,
        (ArchiveState::Retitled, Some(old)) => {
            let renamed = fresh_directory(
                &request.archive_root,
                &manifest,
                &request.session_id,
                &title,
                Some(old.as_path()),
            );
            if old != renamed && old.exists() {
                fs::rename(&old, &renamed).with_context(|| {
                    format!("failed to rename {} to {}", old.display(), renamed.display())
                })?;
            }
            renamed
        }
        _ => fresh_directory(
            &request.archive_root,
            &manifest,
            &request.session_id,
            &title,
            None,
        ),
    };
    let directory_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    manifest.insert(request.session_id.clone(), dir.display().to_string());
    save_manifest(&request.archive_root, &manifest)?;
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let raw_copy = dir.join(RAW_TRANSCRIPT_FILE);
    fs::write(&raw_copy, &bytes)
        .with_context(|| format!("failed to write {}", raw_copy.display()))?;

    let stats = collect_stats(&events);
    let project_dir = project_dir_from_transcript(ctx.paths, &request.transcript);
    let artifacts = extract_artifacts(&events, project_dir.as_deref());
    let mut relationships = detect_relationships(&events);
    relationships.continues_hint = request.continues.clone();

    let plan_files = copy_plans(ctx, &request.session_id, &dir);
    run_renderer(ctx, request, &dir, &title);

    let metadata = build_metadata(&MetadataInput {
        session_id: &request.session_id,
        raw_copy: &raw_copy,
        stats: &stats,
        title: &title,
        artifacts: &artifacts,
        relationships: &relationships,
        plan_files: &plan_files,
        directory_name: &directory_name,
        three_ps: request.three_ps.as_ref(),
        needs_review: request.three_ps.is_none(),
        project_dir: project_dir.as_deref(),
    })?;
    write_metadata(&dir, &request.transcript, &metadata)?;

    if request.three_ps.is_some() {
        let messages = extract_conversation(&events);
        if !messages.is_empty() {
            let md_path = dir.join(MARKDOWN_FILE);
            fs::write(&md_path, render_markdown(&messages, &title, Some(&metadata)))
                .with_context(|| format!("failed to write {}", md_path.display()))?;
            logger.info(format!("Generated: {}", md_path.display()));

            let pdf_path = dir.join(PDF_FILE);
            match export_pdf(&ctx.config.pdf, &messages, &title, &pdf_path) {
                Ok(()) => logger.info(format!("Generated: {}", pdf_path.display())),
                Err(err) => warn::emit_tool_failure(
                    logger,
                    "pdf",
                    &request.session_id,
                    "PDF generation failed",
                    &err,
                ),
            }
        }
    }

    update_catalog(&request.archive_root, &metadata)?;

    let title_marker = dir.join(TITLE_MARKER);
    fs::write(&title_marker, &title)
        .with_context(|| format!("failed to write {}", title_marker.display()))?;
    let size_marker = dir.join(SIZE_MARKER);
    fs::write(&size_marker, size.to_string())
        .with_context(|| format!("failed to write {}", size_marker.display()))?;

    Ok(ArchiveOutcome::Archived { dir, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::catalog::load_catalog;
    use crate::archive::config::{PdfConfig, RendererConfig};
    use crate::archive::metadata::{METADATA_FILE, SessionMetadata, file_sha256};
    use serde_json::json;
    use std::thread;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        tmp: TempDir,
        paths: ArchivePaths,
        config: ArchiveConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempdir().expect("tempdir");
            let paths = ArchivePaths::under(&tmp.path().join(".claude"));
            let missing = tmp.path().join("missing-bin").display().to_string();
            let config = ArchiveConfig {
                renderer: RendererConfig {
                    enabled: true,
                    bin: missing.clone(),
                },
                pdf: PdfConfig {
                    pandoc_bin: missing,
                    ..PdfConfig::default()
                },
            };
            Self { tmp, paths, config }
        }

        fn ctx(&self) -> ArchiveContext<'_> {
            ArchiveContext {
                paths: &self.paths,
                config: &self.config,
                logger: Logger::new(true),
            }
        }

        fn root(&self) -> PathBuf {
            self.tmp.path().join("archive")
        }

        fn transcript(&self, name: &str, body: &str) -> PathBuf {
            let path = self.tmp.path().join(name);
            fs::write(&path, body).expect("write transcript");
            path
        }

        fn request(&self, session_id: &str, transcript: &Path) -> ArchiveRequest {
            ArchiveRequest {
                session_id: session_id.to_string(),
                transcript: transcript.to_path_buf(),
                archive_root: self.root(),
                ..ArchiveRequest::default()
            }
        }

        fn archive(&self, request: &ArchiveRequest) -> ArchiveOutcome {
            archive_session(&self.ctx(), request).expect("archive")
        }
    }

    fn transcript_body(request_text: &str) -> String {
        [
            json!({"type": "user", "timestamp": "2026-01-14T10:00:00.000Z", "version": "2.1.3",
                "message": {"role": "user", "content": request_text}}),
            json!({"type": "assistant", "timestamp": "2026-01-14T10:04:00.000Z",
                "message": {"role": "assistant", "model": "claude-sonnet-4",
                    "usage": {"input_tokens": 1000, "output_tokens": 500},
                    "content": [
                        {"type": "text", "text": "Done."},
                        {"type": "tool_use", "name": "Write", "input": {"file_path": "/tmp/out.py"}}
                    ]}}),
        ]
        .iter()
        .map(|v| format!("{v}\n"))
        .collect()
    }

    fn metadata(dir: &Path) -> SessionMetadata {
        let raw = fs::read_to_string(dir.join(METADATA_FILE)).expect("read metadata");
        serde_json::from_str(&raw).expect("parse metadata")
    }

    fn archived(outcome: &ArchiveOutcome) -> PathBuf {
        outcome.archived_dir().expect("archived").to_path_buf()
    }

    #[test]
    fn first_archive_writes_full_layout() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Fix the login redirect loop"));
        let outcome = fx.archive(&fx.request("s1", &transcript));
        let dir = archived(&outcome);
        assert!(matches!(
            outcome,
            ArchiveOutcome::Archived {
                state: ArchiveState::NotArchived,
                ..
            }
        ));

        let name = dir.file_name().expect("name").to_string_lossy().into_owned();
        assert!(name.ends_with("-fix-the-login-redirect-loop"));
        assert_eq!(
            fs::read_to_string(dir.join(TITLE_MARKER)).expect("title"),
            "Fix the login redirect loop"
        );
        assert_eq!(
            fs::read(dir.join(RAW_TRANSCRIPT_FILE)).expect("raw"),
            fs::read(&transcript).expect("source")
        );
        assert_eq!(
            read_size_marker(&dir),
            Some(fs::metadata(&transcript).expect("stat").len())
        );
        assert!(fx.tmp.path().join("s1.jsonl.meta.json").exists());

        let meta = metadata(&dir);
        assert_eq!(meta.archive.directory_name, name);
        assert!(meta.archive.needs_review);
        assert_eq!(meta.statistics.turns, 1);
        assert_eq!(meta.session.duration_minutes, 4);

        let manifest = load_manifest(&fx.root()).expect("manifest");
        assert_eq!(manifest.get("s1"), Some(&dir.display().to_string()));
        let catalog = load_catalog(&fx.root()).expect("catalog");
        assert_eq!(catalog.total_sessions, 1);
        assert_eq!(catalog.needs_review_count, 1);
        assert!(!dir.join(MARKDOWN_FILE).exists());
    }

    #[test]
    fn unchanged_transcript_is_a_no_op() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let dir = archived(&fx.archive(&fx.request("s1", &transcript)));
        let before = fs::metadata(dir.join(METADATA_FILE))
            .and_then(|m| m.modified())
            .expect("mtime");

        thread::sleep(Duration::from_millis(1100));
        let outcome = fx.archive(&fx.request("s1", &transcript));
        assert_eq!(outcome, ArchiveOutcome::Unchanged { dir: dir.clone() });
        let after = fs::metadata(dir.join(METADATA_FILE))
            .and_then(|m| m.modified())
            .expect("mtime");
        assert_eq!(before, after);
    }

    #[test]
    fn forced_archive_rewrites_in_place() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let dir = archived(&fx.archive(&fx.request("s1", &transcript)));
        let before = fs::metadata(dir.join(METADATA_FILE))
            .and_then(|m| m.modified())
            .expect("mtime");

        thread::sleep(Duration::from_millis(1100));
        let mut request = fx.request("s1", &transcript);
        request.force = true;
        let outcome = fx.archive(&request);
        assert_eq!(
            outcome,
            ArchiveOutcome::Archived {
                dir: dir.clone(),
                state: ArchiveState::ArchivedChanged
            }
        );
        let after = fs::metadata(dir.join(METADATA_FILE))
            .and_then(|m| m.modified())
            .expect("mtime");
        assert!(after > before);
    }

    #[test]
    fn grown_transcript_keeps_directory_and_stored_title() {
        let fx = Fixture::new();
        let body = transcript_body("Refactor the parser module");
        let transcript = fx.transcript("s1.jsonl", &body);
        let mut first = fx.request("s1", &transcript);
        first.title = Some("Parser cleanup".to_string());
        let dir = archived(&fx.archive(&first));

        let extra = json!({"type": "user", "timestamp": "2026-01-14T10:09:00.000Z",
            "message": {"role": "user", "content": "Also add tests please"}});
        fs::write(&transcript, format!("{body}{extra}\n")).expect("append");
        let outcome = fx.archive(&fx.request("s1", &transcript));
        assert_eq!(
            outcome,
            ArchiveOutcome::Archived {
                dir: dir.clone(),
                state: ArchiveState::ArchivedChanged
            }
        );
        let meta = metadata(&dir);
        assert_eq!(meta.auto_generated.title, "Parser cleanup");
        assert_eq!(meta.statistics.turns, 2);
    }

    #[test]
    fn retitle_renames_directory_and_updates_stores() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let old = archived(&fx.archive(&fx.request("s1", &transcript)));

        let mut request = fx.request("s1", &transcript);
        request.retitle = true;
        request.title = Some("Parser Rewrite".to_string());
        let outcome = fx.archive(&request);
        let new = archived(&outcome);
        assert!(matches!(
            outcome,
            ArchiveOutcome::Archived {
                state: ArchiveState::Retitled,
                ..
            }
        ));

        assert!(!old.exists());
        assert!(new.join(METADATA_FILE).exists());
        assert!(new.display().to_string().ends_with("-parser-rewrite"));
        let manifest = load_manifest(&fx.root()).expect("manifest");
        assert_eq!(manifest.get("s1"), Some(&new.display().to_string()));
        let catalog = load_catalog(&fx.root()).expect("catalog");
        assert_eq!(catalog.sessions.len(), 1);
        assert_eq!(catalog.sessions[0].title, "Parser Rewrite");
        let old_name = old.file_name().expect("name").to_string_lossy().into_owned();
        assert_ne!(catalog.sessions[0].directory, old_name);
    }

    #[test]
    fn summary_marks_reviewed_and_exports_markdown() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Fix the login redirect loop"));
        let mut request = fx.request("s1", &transcript);
        request.three_ps = Some(ThreePs {
            prompt_summary: "fix login".to_string(),
            ..ThreePs::default()
        });
        let dir = archived(&fx.archive(&request));

        let meta = metadata(&dir);
        assert!(!meta.archive.needs_review);
        assert_eq!(meta.three_ps.prompt_summary, "fix login");
        assert_eq!(meta.three_ps.process_summary, "");

        let md = fs::read_to_string(dir.join(MARKDOWN_FILE)).expect("markdown");
        assert!(md.starts_with("# Fix the login redirect loop\n\n**Date**: 2026-01-14\n"));
        assert!(md.contains("**Model**: claude-sonnet-4"));
        assert!(md.contains("- Write: out.py"));
        assert!(!dir.join(PDF_FILE).exists());

        let catalog = load_catalog(&fx.root()).expect("catalog");
        assert_eq!(catalog.needs_review_count, 0);
    }

    #[test]
    fn missing_and_empty_transcripts_are_reported() {
        let fx = Fixture::new();
        let missing = fx.tmp.path().join("nope.jsonl");
        assert_eq!(
            fx.archive(&fx.request("s1", &missing)),
            ArchiveOutcome::MissingTranscript
        );
        let empty = fx.transcript("empty.jsonl", "  \n\n");
        assert_eq!(
            fx.archive(&fx.request("s1", &empty)),
            ArchiveOutcome::EmptyTranscript
        );
        assert!(!fx.root().exists());
    }

    #[test]
    fn unsluggable_title_falls_back_to_session_prefix() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s.jsonl", &transcript_body("Refactor the parser module"));
        let mut request = fx.request("abcdef0123456789", &transcript);
        request.title = Some("???".to_string());
        let dir = archived(&fx.archive(&request));
        assert!(dir.display().to_string().ends_with("-abcdef01"));
    }

    #[test]
    fn same_title_on_same_day_gets_distinct_directories() {
        let fx = Fixture::new();
        let body = transcript_body("Refactor the parser module");
        let a = fx.transcript("a.jsonl", &body);
        let b = fx.transcript("b.jsonl", &body);
        let dir_a = archived(&fx.archive(&fx.request("aaaaaaaa-1", &a)));
        let dir_b = archived(&fx.archive(&fx.request("bbbbbbbb-2", &b)));
        assert_ne!(dir_a, dir_b);
        assert!(dir_b.display().to_string().ends_with("-bbbbbbbb"));
        let catalog = load_catalog(&fx.root()).expect("catalog");
        assert_eq!(catalog.total_sessions, 2);
    }

    #[test]
    fn plan_files_and_continuation_are_recorded() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.paths.plans_dir).expect("mkdir plans");
        fs::write(fx.paths.plans_dir.join("roadmap.md"), "# Plan\n").expect("write plan");
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let mut request = fx.request("s1", &transcript);
        request.continues = Some("00000000-0000-0000-0000-000000000000".to_string());
        let dir = archived(&fx.archive(&request));

        assert!(dir.join("plans").join("roadmap.md").exists());
        let meta = metadata(&dir);
        assert_eq!(meta.plan_files, vec!["roadmap.md"]);
        assert_eq!(
            meta.relationships.continues.as_deref(),
            Some("00000000-0000-0000-0000-000000000000")
        );
    }

    #[cfg(unix)]
    #[test]
    fn renderer_output_gets_session_title() {
        use std::os::unix::fs::PermissionsExt;
        let mut fx = Fixture::new();
        let bin = fx.tmp.path().join("renderer");
        fs::write(
            &bin,
            "#!/usr/bin/env bash\nprintf '<html><head><title>Claude Code transcript</title></head><body>x</body></html>' > \"$4/index.html\"\n",
        )
        .expect("write renderer");
        let mut perms = fs::metadata(&bin).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&bin, perms).expect("chmod");
        fx.config.renderer.bin = bin.display().to_string();

        let transcript = fx.transcript("s1.jsonl", &transcript_body("Fix the login redirect loop"));
        let dir = archived(&fx.archive(&fx.request("s1", &transcript)));
        let index = fs::read_to_string(dir.join("index.html")).expect("index");
        assert!(index.contains("<title>Fix the login redirect loop</title>"));
        assert!(index.contains("<h1 style=\"margin: 20px; font-family: system-ui;\">Fix the login redirect loop</h1>"));
    }

    #[cfg(unix)]
    #[test]
    fn metadata_describes_the_raw_copy_when_source_grows() {
        use std::os::unix::fs::PermissionsExt;
        let mut fx = Fixture::new();
        let bin = fx.tmp.path().join("appending-renderer");
        fs::write(
            &bin,
            "#!/usr/bin/env bash\necho '{\"type\":\"user\",\"message\":{\"content\":\"late line\"}}' >> \"$2\"\n",
        )
        .expect("write renderer");
        let mut perms = fs::metadata(&bin).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&bin, perms).expect("chmod");
        fx.config.renderer.bin = bin.display().to_string();

        let body = transcript_body("Fix the login redirect loop");
        let transcript = fx.transcript("s1.jsonl", &body);
        let dir = archived(&fx.archive(&fx.request("s1", &transcript)));

        let source_len = fs::metadata(&transcript).expect("stat").len();
        assert!(source_len > body.len() as u64);

        let raw = dir.join(RAW_TRANSCRIPT_FILE);
        let meta = metadata(&dir);
        assert_eq!(meta.archive.jsonl_bytes, body.len() as u64);
        assert_eq!(
            meta.archive.jsonl_sha256,
            file_sha256(&raw).expect("hash raw copy")
        );
        assert_eq!(read_size_marker(&dir), Some(body.len() as u64));
    }

    #[test]
    fn retitle_onto_occupied_name_picks_a_free_directory() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let old = archived(&fx.archive(&fx.request("s1", &transcript)));

        let leftover = fx.root().join(format!("{}-parser-rewrite", today_local()));
        fs::create_dir_all(&leftover).expect("mkdir leftover");
        fs::write(leftover.join("keep.txt"), "orphan").expect("write leftover");

        let mut request = fx.request("s1", &transcript);
        request.retitle = true;
        request.title = Some("Parser Rewrite".to_string());
        let new = archived(&fx.archive(&request));

        assert_ne!(new, leftover);
        assert!(new.display().to_string().ends_with("-parser-rewrite-s1"));
        assert!(!old.exists());
        assert!(new.join(METADATA_FILE).exists());
        assert_eq!(
            fs::read_to_string(leftover.join("keep.txt")).expect("leftover intact"),
            "orphan"
        );
        let manifest = load_manifest(&fx.root()).expect("manifest");
        assert_eq!(manifest.get("s1"), Some(&new.display().to_string()));
    }

    #[test]
    fn retitle_to_the_same_name_keeps_the_directory() {
        let fx = Fixture::new();
        let transcript = fx.transcript("s1.jsonl", &transcript_body("Refactor the parser module"));
        let mut first = fx.request("s1", &transcript);
        first.title = Some("Parser Rewrite".to_string());
        let dir = archived(&fx.archive(&first));

        let mut request = fx.request("s1", &transcript);
        request.retitle = true;
        request.title = Some("Parser Rewrite".to_string());
        assert_eq!(archived(&fx.archive(&request)), dir);
    }
}
