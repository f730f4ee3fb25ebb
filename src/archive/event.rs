//! Classification of raw transcript records.
//!
//! A transcript is a JSONL file where each line is one record. Records are
//! decoded into [`TranscriptEvent`] without failing on shapes we do not
//! understand: unknown roles, unknown content blocks and missing fields all
//! degrade to defaults. Lines that are not JSON objects are dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record type Claude Code uses for file-history checkpoints.
pub const SNAPSHOT_TYPE: &str = "file-history-snapshot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Snapshot,
    Other(String),
}

impl Role {
    fn parse(raw: &str) -> Self {
        match raw {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            SNAPSHOT_TYPE => Self::Snapshot,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Resolve the effective role of a record: `message.role` when present,
/// otherwise the record's top-level `type`.
pub fn resolve_role(record: &Value) -> Role {
    let message_role = record
        .get("message")
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str);
    let record_type = record.get("type").and_then(Value::as_str);
    Role::parse(message_role.or(record_type).unwrap_or(""))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            input_tokens: field("input_tokens"),
            output_tokens: field("output_tokens"),
            cache_read_input_tokens: field("cache_read_input_tokens"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub name: Option<String>,
    pub input: Map<String, Value>,
}

impl ToolUse {
    pub fn name_or_unknown(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    /// Non-empty `file_path` argument, if the tool carries one.
    pub fn file_path(&self) -> Option<&str> {
        self.input_str("file_path").filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Thinking,
    ToolUse(ToolUse),
    ToolResult,
    Other,
}

impl ContentBlock {
    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Other;
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("text") => Self::Text(
                obj.get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            Some("thinking") => Self::Thinking,
            Some("tool_use") => Self::ToolUse(ToolUse {
                name: obj.get("name").and_then(Value::as_str).map(str::to_string),
                input: obj
                    .get("input")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            }),
            Some("tool_result") => Self::ToolResult,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    #[default]
    Empty,
}

impl MessageContent {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(text)) => Self::Text(text.clone()),
            Some(Value::Array(items)) => {
                Self::Blocks(items.iter().map(ContentBlock::from_value).collect())
            }
            _ => Self::Empty,
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Blocks(blocks) => blocks,
            _ => &[],
        }
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.blocks().iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool) => Some(tool),
            _ => None,
        })
    }

    /// String content verbatim, or the `text` blocks joined with `separator`.
    pub fn joined_text(&self, separator: &str) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(separator),
            Self::Empty => String::new(),
        }
    }

    /// String content, or the first non-empty `text` block.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Blocks(blocks) => blocks.iter().find_map(|block| match block {
                ContentBlock::Text(text) if !text.is_empty() => Some(text.as_str()),
                _ => None,
            }),
            Self::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub record_type: Option<String>,
    pub role: Role,
    pub timestamp: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub usage: TokenUsage,
    pub content: MessageContent,
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl TranscriptEvent {
    /// Classify one decoded record. Returns `None` for non-object JSON.
    pub fn from_value(record: &Value) -> Option<Self> {
        record.as_object()?;
        let message = record.get("message");
        let usage = message
            .and_then(|m| m.get("usage"))
            .or_else(|| record.get("usage"))
            .map(TokenUsage::from_value)
            .unwrap_or_default();

        Some(Self {
            record_type: record
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
            role: resolve_role(record),
            timestamp: non_empty_str(record.get("timestamp")),
            model: non_empty_str(message.and_then(|m| m.get("model"))),
            version: non_empty_str(record.get("version")),
            usage,
            content: MessageContent::from_value(message.and_then(|m| m.get("content"))),
        })
    }

    pub fn is_snapshot(&self) -> bool {
        self.record_type.as_deref() == Some(SNAPSHOT_TYPE) || self.role == Role::Snapshot
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

pub fn parse_line(line: &str) -> Option<TranscriptEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let record = serde_json::from_str::<Value>(trimmed).ok()?;
    TranscriptEvent::from_value(&record)
}

/// Decode every well-formed line, dropping snapshot markers.
pub fn parse_transcript(content: &str) -> Vec<TranscriptEvent> {
    content
        .lines()
        .filter_map(parse_line)
        .filter(|event| !event.is_snapshot())
        .collect()
}
