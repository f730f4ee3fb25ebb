use thiserror::Error;

/// Failure modes of the external collaborators (HTML renderer, pandoc).
/// All of them degrade a single output and never abort archiving.
#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("{tool} not found{hint}")]
    Missing { tool: String, hint: String },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExternalToolError {
    pub fn missing(tool: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Missing {
            tool: tool.into(),
            hint: hint.map(|h| format!(". {h}")).unwrap_or_default(),
        }
    }

    pub fn code(&self) -> ArchiveErrorCode {
        match self {
            Self::Missing { .. } => ArchiveErrorCode::W001ToolMissing,
            Self::Failed { .. } | Self::Spawn { .. } => ArchiveErrorCode::W002ToolFailed,
            Self::TimedOut { .. } => ArchiveErrorCode::W003ToolTimeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorCode {
    W001ToolMissing,
    W002ToolFailed,
    W003ToolTimeout,
    W004HtmlPatch,
    W005PlanCopy,
}

impl ArchiveErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::W001ToolMissing => "W001_TOOL_MISSING",
            Self::W002ToolFailed => "W002_TOOL_FAILED",
            Self::W003ToolTimeout => "W003_TOOL_TIMEOUT",
            Self::W004HtmlPatch => "W004_HTML_PATCH",
            Self::W005PlanCopy => "W005_PLAN_COPY",
        }
    }
}
