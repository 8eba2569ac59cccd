//! Heading outline derivation.
//!
//! Headings of every level are pooled into a single sequence in document
//! order. The i-th heading's anchor is `heading-{i}-{slug}`; the index prefix
//! keeps anchors unique even when two headings share the same text.

use crate::html::SourceHeading;

/// One navigable outline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// Heading rank (1–6).
    pub level: u8,
    /// Trimmed heading text.
    pub text: String,
    /// Element id assigned to the heading, used as the scroll target.
    pub anchor_id: String,
}

/// Ordered outline of one rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    entries: Vec<OutlineEntry>,
}

impl Outline {
    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<OutlineEntry> {
        self.entries
    }
}

/// Lower-case `text` and replace every character outside `[a-z0-9]` with `-`.
///
/// Characters outside the Basic Multilingual Plane produce two hyphens, one
/// per UTF-16 code unit, so anchors match what a browser-side regex replace
/// over the same text would produce.
pub fn slug(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else {
            for _ in 0..c.len_utf16() {
                out.push('-');
            }
        }
    }
    out
}

/// Anchor id of the heading at `index` in document order.
pub fn anchor_id(index: usize, text: &str) -> String {
    format!("heading-{index}-{}", slug(text))
}

/// Build the outline from headings in document order.
pub fn build(headings: &[SourceHeading]) -> Outline {
    let entries = headings
        .iter()
        .enumerate()
        .map(|(index, heading)| {
            let text = heading.text.trim().to_owned();
            let anchor_id = anchor_id(index, &text);
            OutlineEntry {
                level: heading.level,
                text,
                anchor_id,
            }
        })
        .collect();
    Outline { entries }
}

/// Write each entry's anchor onto its heading element: `<hN>` → `<hN id="...">`.
///
/// Entries are applied in order, each replacing the first still-bare opening
/// tag of its level. comrak runs with raw HTML disabled, so bare `<hN>` tags
/// in its output only ever come from markdown headings.
pub fn assign_anchor_ids(html: &str, outline: &Outline) -> String {
    let mut result = html.to_owned();
    for entry in outline.entries() {
        let tag = format!("<h{}>", entry.level);
        let with_id = format!("<h{} id=\"{}\">", entry.level, entry.anchor_id);
        result = result.replacen(&tag, &with_id, 1);
    }
    result
}
