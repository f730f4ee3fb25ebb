use crate::archive::event::TranscriptEvent;
use regex::Regex;
use std::sync::LazyLock;

pub const UNTITLED_SESSION: &str = "Untitled Session";
const UNTITLED_SLUG: &str = "untitled";
const MIN_REQUEST_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 60;
const MAX_SLUG_CHARS: usize = 50;

/// Leading tags injected by IDE integrations rather than typed by the user.
const IDE_CONTEXT_PREFIXES: &[&str] = &[
    r"^<ide_opened_file>",
    r"^<ide_selection>",
    r"^<ide_visible_files>",
    r"^<system-reminder>",
    r"^<command-name>",
];

static IDE_CONTEXT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    IDE_CONTEXT_PREFIXES
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("ide pattern is valid"))
        .collect()
});

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:hi|hello|hey|please|can you|could you)\s+").expect("greeting pattern")
});

static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug filter pattern"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// True when `text` is IDE context or too short to describe a request.
pub fn is_ide_context_message(text: &str) -> bool {
    let text = text.trim();
    if IDE_CONTEXT_RES.iter().any(|re| re.is_match(text)) {
        return true;
    }
    text.chars().count() < MIN_REQUEST_CHARS
}

fn strip_greetings(text: &str) -> &str {
    let mut rest = text;
    while let Some(found) = GREETING_RE.find(rest) {
        rest = &rest[found.end()..];
    }
    rest
}

/// Turn an accepted request into a short display title.
pub fn title_from_request(text: &str) -> String {
    let stripped = strip_greetings(text.trim());
    let sentence = stripped
        .split(['.', '!', '?', '\n'])
        .next()
        .unwrap_or_default();
    let title = sentence
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        UNTITLED_SESSION.to_string()
    } else {
        title
    }
}

/// Title from the first substantive user message, or [`UNTITLED_SESSION`].
pub fn generate_title(events: &[TranscriptEvent]) -> String {
    events
        .iter()
        .filter(|e| e.is_user())
        .filter_map(|e| e.content.first_text())
        .find(|text| !text.trim().is_empty() && !is_ide_context_message(text))
        .map(title_from_request)
        .unwrap_or_else(|| UNTITLED_SESSION.to_string())
}

/// Lowercased, hyphenated form of `title`; empty when nothing survives.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept = NON_SLUG_RE.replace_all(&lowered, "");
    let dashed = WHITESPACE_RE.replace_all(&kept, "-");
    let truncated = dashed.chars().take(MAX_SLUG_CHARS).collect::<String>();
    truncated.trim_matches('-').to_string()
}

/// Filesystem-safe slug for a title, never empty.
pub fn sanitize_filename(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        UNTITLED_SLUG.to_string()
    } else {
        slug
    }
}
