use crate::archive::config::{RENDERER_BIN, RendererConfig};
use crate::archive::util::{
    html_escape, require_success, resolve_bin, run_command_with_optional_timeout,
};
use crate::error::ExternalToolError;
use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

pub const RENDERER_INSTALL_HINT: &str = "Install with: pip install claude-code-transcripts";
pub const INDEX_HTML: &str = "index.html";

static RENDERER_MISSING_REPORTED: AtomicBool = AtomicBool::new(false);

static GENERIC_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<title>Claude Code transcript[^<]*</title>").expect("title pattern")
});

static BODY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<body[^>]*>").expect("body pattern"));

/// True the first time it is called in this process.
pub fn first_missing_renderer_report() -> bool {
    !RENDERER_MISSING_REPORTED.swap(true, Ordering::Relaxed)
}

/// Run the transcript-to-HTML renderer into `out_dir`.
pub fn render_html(
    cfg: &RendererConfig,
    transcript: &Path,
    out_dir: &Path,
) -> Result<(), ExternalToolError> {
    let bin = resolve_bin(&cfg.bin)
        .ok_or_else(|| ExternalToolError::missing(RENDERER_BIN, Some(RENDERER_INSTALL_HINT)))?;
    let mut cmd = Command::new(bin);
    cmd.arg("json")
        .arg(transcript)
        .arg("-o")
        .arg(out_dir)
        .arg("--json");
    let output = run_command_with_optional_timeout(&mut cmd, RENDERER_BIN, None)?;
    require_success(RENDERER_BIN, output)?;
    Ok(())
}

fn retitle_html(content: &str, title: &str, is_index: bool) -> String {
    let escaped = html_escape(title);
    let tag = format!("<title>{escaped}</title>");
    let retitled = GENERIC_TITLE_RE.replace_all(content, NoExpand(&tag));
    if !is_index {
        return retitled.into_owned();
    }
    let heading = format!(
        "\n<h1 style=\"margin: 20px; font-family: system-ui;\">{escaped}</h1>"
    );
    BODY_OPEN_RE
        .replacen(&retitled, 1, |caps: &regex::Captures<'_>| {
            format!("{}{heading}", &caps[0])
        })
        .into_owned()
}

/// Replace the renderer's generic page titles in every top-level `*.html`
/// file of `dir`, and add a heading to `index.html`. Returns the number of
/// files rewritten.
pub fn patch_html_titles(dir: &Path, title: &str) -> Result<usize> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut patched = 0;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_index = path.file_name().is_some_and(|name| name == INDEX_HTML);
        let updated = retitle_html(&content, title, is_index);
        if updated != content {
            fs::write(&path, updated)
                .with_context(|| format!("failed to write {}", path.display()))?;
            patched += 1;
        }
    }
    Ok(patched)
}
