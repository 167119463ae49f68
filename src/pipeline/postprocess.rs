//! Post-processing: deterministic cleanup of model-written narratives.
//!
//! Narratives are plain prose stored in a JSON string, so the rules here
//! strip everything a model tends to wrap around the prose: code fences,
//! an echoed "Narrative paragraph:" label, placeholder image links, and
//! invisible characters.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fences are matched, and the label is
//! removed after the fences so a fenced label is caught too.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences
/// 3. Drop a leading echoed label (`Narrative paragraph:`, `Description:`)
/// 4. Replace placeholder image links with their alt text
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim trailing whitespace per line and collapse runs of blank lines
/// 7. Trim the whole text
pub fn clean_narrative(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_fences(&s);
    let s = strip_leading_label(&s);
    let s = remove_image_links(&s);
    let s = remove_invisible_chars(&s);
    let s = tidy_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```$").unwrap());

fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 3: Drop echoed label ────────────────────────────────────────────────

static RE_LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:narrative(?: paragraph)?|description|summary)(?:\*\*)?\s*:(?:\*\*)?\s*")
        .unwrap()
});

fn strip_leading_label(input: &str) -> String {
    RE_LEADING_LABEL.replace(input, "").to_string()
}

// ── Rule 4: Image links ──────────────────────────────────────────────────────
//
// A narrative never legitimately embeds an image; keep only the alt text.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn remove_image_links(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| caps[1].trim().to_string())
        .to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Tidy lines ───────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn tidy_lines(input: &str) -> String {
    let trimmed = input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANK_LINES.replace_all(&trimmed, "\n\n").to_string()
}
