use crate::error::ExternalToolError;
use chrono::{Local, SecondsFormat};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Local wall-clock time as an ISO 8601 string with offset.
pub fn now_local_iso() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Local date as `YYYY-MM-DD`.
pub fn today_local() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Escape the five HTML-significant characters.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Resolve an external binary: an existing configured path wins, otherwise
/// the name is looked up on `PATH`.
pub fn resolve_bin(configured: &str) -> Option<PathBuf> {
    let candidate = Path::new(configured);
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    which::which(configured).ok()
}

fn spawn_error(tool: &str, source: std::io::Error) -> ExternalToolError {
    ExternalToolError::Spawn {
        tool: tool.to_string(),
        source,
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Run `cmd` to completion, killing it once `timeout_secs` elapses.
///
/// Output pipes are drained on background threads so a chatty child cannot
/// block on a full pipe while we poll for its exit.
pub fn run_command_with_optional_timeout(
    cmd: &mut Command,
    tool: &str,
    timeout_secs: Option<u64>,
) -> Result<Output, ExternalToolError> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|err| spawn_error(tool, err))?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().map_err(|err| spawn_error(tool, err))? {
            break status;
        }
        if let Some(secs) = timeout_secs {
            if started.elapsed() >= Duration::from_secs(secs) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExternalToolError::TimedOut {
                    tool: tool.to_string(),
                    secs,
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Map a non-zero exit into [`ExternalToolError::Failed`].
pub fn require_success(tool: &str, output: Output) -> Result<Output, ExternalToolError> {
    if output.status.success() {
        return Ok(output);
    }
    let status = match output.status.code() {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    };
    Err(ExternalToolError::Failed {
        tool: tool.to_string(),
        status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
