use crate::error::{ArchiveErrorCode, ExternalToolError};
use crate::logging::Logger;

/// One `key=value` field. Multi-line text (tool stderr) is folded onto one
/// line; values with spaces or quotes are quoted so paths stay intact.
fn field(key: &str, value: &str) -> String {
    let folded = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(|c: char| c.is_control(), "");
    if folded.is_empty() {
        format!("{key}=-")
    } else if folded.contains([' ', '"', '=']) {
        format!("{key}={folded:?}")
    } else {
        format!("{key}={folded}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarnLine<'a> {
    pub code: ArchiveErrorCode,
    pub stage: &'a str,
    pub action: &'a str,
    pub session: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

impl WarnLine<'_> {
    pub fn render(&self) -> String {
        let fields = [
            field("code", self.code.as_str()),
            field("stage", self.stage),
            field("action", self.action),
            field("session", self.session),
            field("reason", self.reason),
            field("err", self.err),
        ];
        format!("ARCHIVE_WARN {}", fields.join(" "))
    }
}

pub fn emit(logger: &Logger, line: WarnLine<'_>) {
    logger.diagnostic(line.render());
}

/// Report a degraded external-tool step: a human line plus a structured one.
pub fn emit_tool_failure(
    logger: &Logger,
    stage: &str,
    session: &str,
    reason: &str,
    err: &ExternalToolError,
) {
    logger.warn(format!("{reason}: {err}"));
    emit(
        logger,
        WarnLine {
            code: err.code(),
            stage,
            action: "skipped",
            session,
            reason,
            err: &err.to_string(),
        },
    );
}
