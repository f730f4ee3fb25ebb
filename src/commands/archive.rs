use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use crate::archive::config::load_config;
use crate::archive::metadata::ThreePs;
use crate::archive::paths::{
    ArchivePaths, archive_root, discover_transcript, project_dir_from_transcript, resolve_paths,
};
use crate::archive::pipeline::{
    ArchiveContext, ArchiveOutcome, ArchiveRequest, ArchiveState, archive_session,
};
use crate::archive::render::INDEX_HTML;
use crate::commands::CommandReport;
use crate::logging::Logger;

pub const PARTIAL_ARGS_MSG: &str = "Both --transcript and --session-id must be provided together";
pub const NOTHING_FOUND_MSG: &str = "No transcript found. Run from a project directory or use \
                                     --transcript and --session-id arguments.";

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    pub transcript: Option<PathBuf>,
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub retitle: bool,
    pub force: bool,
    pub local: bool,
    pub output: Option<PathBuf>,
    pub quiet: bool,
    pub prompt: Option<String>,
    pub process: Option<String>,
    pub provenance: Option<String>,
    pub continues: Option<String>,
}

impl ArchiveOptions {
    /// Any summary flag marks the session as reviewed; absent parts are empty.
    fn three_ps(&self) -> Option<ThreePs> {
        if self.prompt.is_none() && self.process.is_none() && self.provenance.is_none() {
            return None;
        }
        Some(ThreePs {
            prompt_summary: self.prompt.clone().unwrap_or_default(),
            process_summary: self.process.clone().unwrap_or_default(),
            provenance_summary: self.provenance.clone().unwrap_or_default(),
        })
    }
}

/// Payload Claude Code hooks write to stdin.
#[derive(Debug, Default, Deserialize)]
struct HookPayload {
    #[serde(default)]
    transcript_path: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

fn parse_hook_payload(raw: &str) -> Option<(PathBuf, String)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let payload = serde_json::from_str::<HookPayload>(trimmed).ok()?;
    let transcript = payload.transcript_path.filter(|p| !p.is_empty())?;
    let session_id = payload.session_id.filter(|s| !s.is_empty())?;
    Some((PathBuf::from(transcript), session_id))
}

fn read_stdin_payload() -> Option<(PathBuf, String)> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut raw = String::new();
    stdin.read_to_string(&mut raw).ok()?;
    parse_hook_payload(&raw)
}

enum Source {
    Found(PathBuf, String),
    Partial,
    Nothing,
}

fn resolve_source(opts: &ArchiveOptions, paths: &ArchivePaths, cwd: &Path, logger: &Logger) -> Source {
    match (&opts.transcript, &opts.session_id) {
        (Some(transcript), Some(session_id)) => {
            return Source::Found(transcript.clone(), session_id.clone());
        }
        (Some(_), None) | (None, Some(_)) => return Source::Partial,
        (None, None) => {}
    }
    if let Some((transcript, session_id)) = read_stdin_payload() {
        return Source::Found(transcript, session_id);
    }
    match discover_transcript(paths, cwd) {
        Some((transcript, session_id)) => {
            logger.info(format!("Auto-discovered: {}", transcript.display()));
            Source::Found(transcript, session_id)
        }
        None => Source::Nothing,
    }
}

pub fn run(opts: &ArchiveOptions) -> Result<CommandReport> {
    let logger = Logger::new(opts.quiet);
    let mut report = CommandReport::new("archive");
    let paths = resolve_paths()?;
    let cwd = env::current_dir().context("failed to resolve current directory")?;

    let (transcript, session_id) = match resolve_source(opts, &paths, &cwd, &logger) {
        Source::Found(transcript, session_id) => (transcript, session_id),
        Source::Partial => {
            logger.error(PARTIAL_ARGS_MSG);
            report.issue(PARTIAL_ARGS_MSG);
            return Ok(report);
        }
        Source::Nothing => {
            logger.error(NOTHING_FOUND_MSG);
            report.issue(NOTHING_FOUND_MSG);
            return Ok(report);
        }
    };

    let config = load_config(&paths.claude_home)?;
    let project_dir = if opts.local {
        None
    } else {
        project_dir_from_transcript(&paths, &transcript)
    };
    let root = archive_root(
        &paths,
        &cwd,
        opts.local,
        opts.output.as_deref(),
        project_dir.as_deref(),
    );

    let request = ArchiveRequest {
        session_id,
        transcript,
        archive_root: root,
        force: opts.force,
        retitle: opts.retitle,
        title: opts.title.clone(),
        three_ps: opts.three_ps(),
        continues: opts.continues.clone(),
    };
    let ctx = ArchiveContext {
        paths: &paths,
        config: &config,
        logger,
    };

    let outcome = archive_session(&ctx, &request)?;
    match &outcome {
        ArchiveOutcome::Archived {
            state: ArchiveState::Retitled,
            ..
        } => logger.info("Retitled; archive directory renamed"),
        ArchiveOutcome::Unchanged { dir } => {
            logger.info(format!("Unchanged since last archive: {}", dir.display()));
        }
        _ => {}
    }
    if let Some(dir) = outcome.archived_dir() {
        logger.info(format!("Archived to: {}", dir.display()));
        logger.info(format!("View transcript: {}", dir.join(INDEX_HTML).display()));
    }
    Ok(report)
}
