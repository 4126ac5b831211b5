//! Model output sanitization
//!
//! The persona contract forbids internal tags, markup and multi-paragraph
//! rambling, but the model cannot be trusted to honor it. Everything the
//! provider returns goes through [`sanitize`] before it is stored or spoken.

use std::sync::LazyLock;

use regex::Regex;

/// Shown instead of an empty or fully stripped model reply.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "Keine Antwort";

// Paired internal-reasoning blocks some instruct models leak despite the
// system prompt. Content between the tags is dropped along with the tags.
static REASONING_BLOCKS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"),
        Regex::new(r"(?s)<scratchpad>.*?</scratchpad>").expect("valid regex"),
        Regex::new(r"(?s)<analysis>.*?</analysis>").expect("valid regex"),
    ]
});

// Any leftover tag-like span: `<` up to the next `>`.
static TAG_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Clean raw provider text for display and speech.
///
/// Applied in order: strip reasoning blocks, strip remaining tag spans,
/// trim, truncate to the first paragraph. Total and idempotent; an empty
/// result falls back to [`EMPTY_REPLY_PLACEHOLDER`].
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();

    for pattern in REASONING_BLOCKS.iter() {
        text = pattern.replace_all(&text, "").trim().to_string();
    }
    text = TAG_SPAN.replace_all(&text, "").trim().to_string();

    // First paragraph only. Keeps replies short even when the model ignores
    // the length instruction and appends meta-commentary after a blank line.
    let first_paragraph = text.split("\n\n").next().unwrap_or("").trim();

    if first_paragraph.is_empty() {
        EMPTY_REPLY_PLACEHOLDER.to_string()
    } else {
        first_paragraph.to_string()
    }
}
