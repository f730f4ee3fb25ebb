//! Readable conversation exports: markdown and a pandoc-rendered PDF.
//!
//! Only what a human reader needs survives extraction. Thinking blocks,
//! tool results and injected context are dropped, and each tool call is
//! reduced to a one-line summary.

use crate::archive::config::{PANDOC_BIN, PdfConfig};
use crate::archive::event::{ToolUse, TranscriptEvent};
use crate::archive::metadata::SessionMetadata;
use crate::archive::util::{
    html_escape, require_success, resolve_bin, run_command_with_optional_timeout,
};
use crate::assets::{PDF_HEADER_TEX, SPEAKER_LUA_FILTER};
use crate::error::ExternalToolError;
use std::fs;
use std::path::Path;
use std::process::Command;

pub const MARKDOWN_FILE: &str = "conversation.md";
pub const PDF_FILE: &str = "conversation.pdf";

const MAX_BASH_CHARS: usize = 60;
const MAX_URL_CHARS: usize = 50;
const SKILL_BODY_MIN_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Self::User => "## User",
            Self::Assistant => "## Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub speaker: Speaker,
    pub text: String,
    pub tools: Vec<String>,
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

fn short_path(raw: &str) -> String {
    let parts = Path::new(raw)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    if parts.len() > 2 {
        parts[parts.len() - 2..].join("/")
    } else {
        file_name(raw)
    }
}

fn file_name(raw: &str) -> String {
    Path::new(raw)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One-line description of a tool call.
pub fn format_tool_summary(tool: &ToolUse) -> String {
    let arg = |key: &str| tool.input_str(key).unwrap_or_default();
    let name = tool.name_or_unknown();
    match name {
        "Read" => format!("Read: {}", short_path(tool.input_str("file_path").unwrap_or("unknown"))),
        "Write" | "Edit" => format!(
            "{name}: {}",
            file_name(tool.input_str("file_path").unwrap_or("unknown"))
        ),
        "Bash" => {
            let command = arg("command");
            let shown = if command.chars().count() > MAX_BASH_CHARS {
                format!("{}...", truncate_chars(command, MAX_BASH_CHARS - 3))
            } else {
                command.to_string()
            };
            format!("Bash: `{shown}`")
        }
        "Grep" => {
            let path = match arg("path") {
                "" => ".",
                path => path,
            };
            format!("Grep: '{}' in {path}", arg("pattern"))
        }
        "Glob" => format!("Glob: {}", arg("pattern")),
        "Task" => format!("Task: {}", arg("description")),
        "WebFetch" => {
            let url = arg("url");
            if url.chars().count() > MAX_URL_CHARS {
                format!("WebFetch: {}...", truncate_chars(url, MAX_URL_CHARS))
            } else {
                format!("WebFetch: {url}")
            }
        }
        "WebSearch" => format!("WebSearch: '{}'", arg("query")),
        other => other.to_string(),
    }
}

/// User text that Claude Code injected rather than the user typed.
fn is_injected_user_text(text: &str) -> bool {
    text.starts_with("<system-reminder>")
        || text.starts_with("<ide_")
        || (text.starts_with("# ") && text.chars().count() > SKILL_BODY_MIN_CHARS)
        || text.contains("<command-name>")
        || text.contains("<command-message>")
        || text.contains("Base directory for this skill:")
        || text.starts_with("Launching skill:")
}

pub fn extract_conversation(events: &[TranscriptEvent]) -> Vec<ConversationMessage> {
    let mut messages = Vec::new();
    for event in events {
        if event.is_user() {
            let text = event.content.joined_text("\n").trim().to_string();
            if text.is_empty() || is_injected_user_text(&text) {
                continue;
            }
            messages.push(ConversationMessage {
                speaker: Speaker::User,
                text,
                tools: Vec::new(),
            });
        } else if event.is_assistant() {
            let text = event.content.joined_text("\n").trim().to_string();
            let tools = event
                .content
                .tool_uses()
                .map(format_tool_summary)
                .collect::<Vec<_>>();
            if text.is_empty() && tools.is_empty() {
                continue;
            }
            messages.push(ConversationMessage {
                speaker: Speaker::Assistant,
                text,
                tools,
            });
        }
    }
    messages
}

fn header_lines(meta: &SessionMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(started) = meta.session.started_at.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("**Date**: {}", truncate_chars(started, 10)));
    }
    if !meta.model.model_id.is_empty() {
        lines.push(format!("**Model**: {}", meta.model.model_id));
    }
    if let Some(version) = meta.model.claude_code_version.as_deref() {
        lines.push(format!("**Claude Code**: v{version}"));
    }
    if meta.session.duration_minutes > 0 {
        lines.push(format!(
            "**Duration**: {} minutes",
            meta.session.duration_minutes
        ));
    }
    if meta.statistics.turns > 0 {
        lines.push(format!("**Turns**: {}", meta.statistics.turns));
    }
    if meta.statistics.estimated_cost_usd > 0.0 {
        lines.push(format!(
            "**Estimated cost**: ${:.2}",
            meta.statistics.estimated_cost_usd
        ));
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines
}

pub fn render_markdown(
    messages: &[ConversationMessage],
    title: &str,
    meta: Option<&SessionMetadata>,
) -> String {
    let mut lines = vec![format!("# {title}"), String::new()];
    if let Some(meta) = meta {
        lines.extend(header_lines(meta));
    }

    for msg in messages {
        lines.push(msg.speaker.heading().to_string());
        lines.push(String::new());
        if !msg.text.is_empty() {
            lines.push(msg.text.clone());
            lines.push(String::new());
        }
        if !msg.tools.is_empty() {
            lines.push("**Tools used:**".to_string());
            lines.extend(msg.tools.iter().map(|summary| format!("- {summary}")));
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

/// Drop control characters LaTeX cannot typeset, keeping tab, LF and CR.
pub fn sanitize_for_pdf(text: &str) -> String {
    text.chars()
        .filter(|&ch| {
            let code = ch as u32;
            matches!(code, 9 | 10 | 13) || (code >= 32 && code != 127 && !(128..=159).contains(&code))
        })
        .collect()
}

/// HTML input for pandoc. Each message is a `data-speaker` div that the
/// Lua filter turns into a framed turn.
pub fn render_pdf_html(messages: &[ConversationMessage], title: &str) -> String {
    let mut lines = vec![
        "<!DOCTYPE html>".to_string(),
        "<html>".to_string(),
        "<head>".to_string(),
        format!("<title>{}</title>", html_escape(&sanitize_for_pdf(title))),
        "</head>".to_string(),
        "<body>".to_string(),
    ];

    for msg in messages {
        lines.push(format!("<div data-speaker=\"{}\">", msg.speaker.as_str()));
        let text = sanitize_for_pdf(&msg.text);
        for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let body = para
                .split('\n')
                .map(html_escape)
                .collect::<Vec<_>>()
                .join("<br>\n");
            lines.push(format!("<p>{body}</p>"));
        }
        if !msg.tools.is_empty() {
            lines.push("<p><strong>Tools used:</strong></p>".to_string());
            lines.push("<ul>".to_string());
            for summary in &msg.tools {
                lines.push(format!("<li>{}</li>", html_escape(&sanitize_for_pdf(summary))));
            }
            lines.push("</ul>".to_string());
        }
        lines.push("</div>".to_string());
    }

    lines.push("</body>".to_string());
    lines.push("</html>".to_string());
    lines.join("\n")
}

fn staging_error(source: std::io::Error) -> ExternalToolError {
    ExternalToolError::Spawn {
        tool: PANDOC_BIN.to_string(),
        source,
    }
}

/// Render `messages` to a PDF at `output` with pandoc, bounded by the
/// configured timeout.
pub fn export_pdf(
    cfg: &PdfConfig,
    messages: &[ConversationMessage],
    title: &str,
    output: &Path,
) -> Result<(), ExternalToolError> {
    let bin = resolve_bin(&cfg.pandoc_bin)
        .ok_or_else(|| ExternalToolError::missing(PANDOC_BIN, None))?;
    let safe_title = sanitize_for_pdf(title);

    let staging = tempfile::tempdir().map_err(staging_error)?;
    let html_path = staging.path().join("input.html");
    let filter_path = staging.path().join("speaker.lua");
    let header_path = staging.path().join("header.tex");
    fs::write(&html_path, render_pdf_html(messages, &safe_title)).map_err(staging_error)?;
    fs::write(&filter_path, SPEAKER_LUA_FILTER).map_err(staging_error)?;
    fs::write(&header_path, PDF_HEADER_TEX).map_err(staging_error)?;

    let mut cmd = Command::new(bin);
    cmd.arg(&html_path)
        .args(["-f", "html+native_divs", "-t", "pdf"])
        .arg(format!("--pdf-engine={}", cfg.engine))
        .arg(format!("--include-in-header={}", header_path.display()))
        .arg(format!("--lua-filter={}", filter_path.display()))
        .args(["-V", "documentclass=article", "-V", "papersize=a4"])
        .arg(format!("--metadata=title:{safe_title}"))
        .arg("-o")
        .arg(output);
    let result = run_command_with_optional_timeout(&mut cmd, PANDOC_BIN, Some(cfg.timeout_secs))?;
    require_success(PANDOC_BIN, result)?;
    Ok(())
}
