use crate::archive::event::{ContentBlock, TranscriptEvent};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
}

impl TokenTotals {
    pub fn merged(self, other: TokenTotals) -> TokenTotals {
        TokenTotals {
            input: self.input + other.input,
            output: self.output + other.output,
            cache_read: self.cache_read + other.cache_read,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallCounts {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub turns: u64,
    pub human_messages: u64,
    pub assistant_messages: u64,
    pub thinking_blocks: u64,
    pub tool_calls: ToolCallCounts,
    pub tokens: TokenTotals,
    pub model: Option<String>,
    pub tool_version: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_minutes: u64,
}

/// USD rates per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_m: f64,
    pub output_per_m: f64,
    pub cache_read_per_m: f64,
}

/// Approximate Claude Sonnet 4 list pricing.
pub const DEFAULT_PRICING: Pricing = Pricing {
    input_per_m: 3.0,
    output_per_m: 15.0,
    cache_read_per_m: 0.30,
};

impl Pricing {
    pub fn estimate(&self, tokens: &TokenTotals) -> f64 {
        let per_m = |count: u64, rate: f64| (count as f64 / 1_000_000.0) * rate;
        let cost = per_m(tokens.input, self.input_per_m)
            + per_m(tokens.output, self.output_per_m)
            + per_m(tokens.cache_read, self.cache_read_per_m);
        round4(cost)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn estimate_cost(tokens: &TokenTotals) -> f64 {
    DEFAULT_PRICING.estimate(tokens)
}

/// RFC 3339, or an ISO timestamp without offset read as UTC.
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whole minutes between two timestamps; 0 when either fails to parse.
pub fn duration_minutes(started_at: &str, ended_at: &str) -> u64 {
    let (Some(start), Some(end)) = (parse_timestamp(started_at), parse_timestamp(ended_at)) else {
        return 0;
    };
    let secs = end.signed_duration_since(start).num_seconds();
    u64::try_from(secs / 60).unwrap_or(0)
}

pub fn collect_stats(events: &[TranscriptEvent]) -> SessionStats {
    let mut stats = SessionStats::default();
    let mut timestamps: Vec<&str> = Vec::new();

    for event in events.iter().filter(|e| !e.is_snapshot()) {
        if let Some(ts) = event.timestamp.as_deref() {
            timestamps.push(ts);
        }

        if event.is_user() {
            stats.turns += 1;
            stats.human_messages += 1;
        } else if event.is_assistant() {
            stats.assistant_messages += 1;
            for block in event.content.blocks() {
                match block {
                    ContentBlock::Thinking => stats.thinking_blocks += 1,
                    ContentBlock::ToolUse(tool) => {
                        stats.tool_calls.total += 1;
                        *stats
                            .tool_calls
                            .by_type
                            .entry(tool.name_or_unknown().to_string())
                            .or_insert(0) += 1;
                    }
                    _ => {}
                }
            }
            if stats.model.is_none() {
                stats.model = event.model.clone();
            }
        }

        if stats.tool_version.is_none() {
            stats.tool_version = event.version.clone();
        }

        stats.tokens = stats.tokens.merged(TokenTotals {
            input: event.usage.input_tokens,
            output: event.usage.output_tokens,
            cache_read: event.usage.cache_read_input_tokens,
        });
    }

    if let (Some(first), Some(last)) = (
        timestamps.iter().min().copied(),
        timestamps.iter().max().copied(),
    ) {
        stats.started_at = Some(first.to_string());
        stats.ended_at = Some(last.to_string());
        stats.duration_minutes = duration_minutes(first, last);
    }

    stats
}
