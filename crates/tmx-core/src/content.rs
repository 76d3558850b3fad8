//! Title and preview derivation from rich content.
//!
//! Both values are pure functions of the content tree and are recomputed on
//! every content write.

use crate::models::RichDocument;

/// Title used when the first block has no text.
pub const UNTITLED: &str = "Untitled";

/// Maximum preview length in characters, before the ellipsis.
pub const PREVIEW_MAX_CHARS: usize = 120;

const ELLIPSIS: char = '\u{2026}';

/// Title and preview derived from one content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedText {
    pub title: String,
    pub preview: String,
}

impl DerivedText {
    pub fn from_document(document: &RichDocument) -> Self {
        Self {
            title: extract_title(document),
            preview: extract_plain_text_preview(document),
        }
    }
}

/// Text of the first block, trimmed; [`UNTITLED`] when blank or missing.
pub fn extract_title(document: &RichDocument) -> String {
    let Some(first) = document.blocks().first() else {
        return UNTITLED.to_string();
    };

    let text = first.text_content();
    let text = text.trim();
    if text.is_empty() {
        UNTITLED.to_string()
    } else {
        text.to_string()
    }
}

/// Text of all blocks joined with spaces, capped at [`PREVIEW_MAX_CHARS`].
pub fn extract_plain_text_preview(document: &RichDocument) -> String {
    preview_with_limit(document, PREVIEW_MAX_CHARS)
}

fn preview_with_limit(document: &RichDocument, max_chars: usize) -> String {
    let all_text = document
        .blocks()
        .iter()
        .map(crate::models::RichNode::text_content)
        .collect::<Vec<_>>()
        .join(" ");
    let all_text = all_text.trim();

    if all_text.chars().count() <= max_chars {
        return all_text.to_string();
    }

    let mut preview = all_text.chars().take(max_chars).collect::<String>();
    preview.push(ELLIPSIS);
    preview
}
