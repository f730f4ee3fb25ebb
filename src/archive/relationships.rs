use crate::archive::event::TranscriptEvent;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\b")
        .expect("session id pattern is valid")
});

/// Continuation phrases, checked in this order for every user message.
const CONTINUATION_PATTERNS: &[&str] = &[
    r"continu(?:e|ing|ed)\s+from",
    r"pick(?:ing)?\s+up\s+(?:from\s+)?where",
    r"previous\s+session",
    r"last\s+session",
    r"earlier\s+(?:session|conversation)",
];

static CONTINUATION_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CONTINUATION_PATTERNS
        .iter()
        .map(|pattern| {
            let re = Regex::new(&format!("(?i){pattern}"))
                .expect("continuation pattern is valid");
            (*pattern, re)
        })
        .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipHints {
    /// Only set from outside the detector, once a link has been confirmed.
    pub continues_hint: Option<String>,
    pub references_hints: Vec<String>,
    pub detection_notes: Vec<String>,
}

impl RelationshipHints {
    fn scan_text(&mut self, text: &str) {
        for found in SESSION_ID_RE.captures_iter(text) {
            let id = &found[1];
            if self.references_hints.iter().any(|known| known == id) {
                continue;
            }
            self.references_hints.push(id.to_string());
            self.detection_notes
                .push(format!("Found session ID reference: {id}"));
        }

        for (pattern, re) in CONTINUATION_RES.iter() {
            if re.is_match(text) {
                self.detection_notes
                    .push(format!("Found continuation language matching: '{pattern}'"));
            }
        }
    }
}

pub fn detect_relationships(events: &[TranscriptEvent]) -> RelationshipHints {
    let mut hints = RelationshipHints::default();
    for event in events.iter().filter(|e| e.is_user()) {
        let text = event.content.joined_text(" ");
        if !text.is_empty() {
            hints.scan_text(&text);
        }
    }
    hints
}
