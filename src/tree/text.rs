//! Text-span resolution: text anchors → substrings of the document text.
//!
//! Anchor offsets are character (Unicode scalar) indices, not byte offsets.
//! [`FullText`] precomputes the byte position of every character once per
//! document so each slice is O(1); for pure-ASCII text, where the two
//! coincide, no table is built at all.

use crate::model::TextAnchor;

/// The full document text, indexed by character.
#[derive(Debug, Clone, Default)]
pub struct FullText {
    text: String,
    /// Byte offset of each character plus a final `text.len()` entry.
    /// Empty for ASCII text.
    boundaries: Vec<usize>,
}

impl FullText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let boundaries = if text.is_ascii() {
            Vec::new()
        } else {
            text.char_indices()
                .map(|(byte, _)| byte)
                .chain(std::iter::once(text.len()))
                .collect()
        };
        Self { text, boundaries }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        if self.boundaries.is_empty() {
            self.text.len()
        } else {
            self.boundaries.len() - 1
        }
    }

    /// Characters `start..end`, or `None` if the range is empty, inverted,
    /// or runs past the end of the text.
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        if end <= start || end > self.char_len() {
            return None;
        }
        if self.boundaries.is_empty() {
            return self.text.get(start..end);
        }
        self.text.get(self.boundaries[start]..self.boundaries[end])
    }
}

/// Resolve an anchor to its text: segments concatenated in order, trimmed.
///
/// Segments with a negative start, an end not after the start, or an end
/// past the text are skipped; the remaining segments are still used.
pub fn resolve(anchor: Option<&TextAnchor>, text: &FullText) -> String {
    let Some(anchor) = anchor else {
        return String::new();
    };

    let mut out = String::new();
    for segment in &anchor.text_segments {
        let (start, end) = (segment.start(), segment.end());
        if start < 0 {
            continue;
        }
        let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
            continue;
        };
        if let Some(part) = text.slice(start, end) {
            out.push_str(part);
        }
    }
    out.trim().to_string()
}
