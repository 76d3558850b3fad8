//! Rich-content document tree.
//!
//! Notes carry editor output as a JSON tree of typed nodes. The tree is stored
//! verbatim; the only thing this crate does with it is walk it for text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DOC_TYPE: &str = "doc";
const PARAGRAPH_TYPE: &str = "paragraph";
const TEXT_TYPE: &str = "text";

/// Root of a rich-content tree: `{ "type": "doc", "content": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichDocument {
    #[serde(rename = "type", default = "doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub content: Vec<RichNode>,
}

/// A node in the content tree (block, inline or text leaf).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<RichNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<RichMark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Inline formatting attached to a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichMark {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

fn doc_type() -> String {
    DOC_TYPE.to_string()
}

impl Default for RichDocument {
    fn default() -> Self {
        Self {
            doc_type: doc_type(),
            content: Vec::new(),
        }
    }
}

impl RichDocument {
    /// Content of a freshly created note: a single empty paragraph.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            doc_type: doc_type(),
            content: vec![RichNode::paragraph("")],
        }
    }

    /// Build a document with one paragraph per line of `text`.
    #[must_use]
    pub fn from_plain_text(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::blank();
        }

        Self {
            doc_type: doc_type(),
            content: text.lines().map(RichNode::paragraph).collect(),
        }
    }

    /// Top-level blocks of the document.
    pub fn blocks(&self) -> &[RichNode] {
        &self.content
    }

    /// One line of text per top-level block. Formatting is dropped.
    pub fn to_plain_text(&self) -> String {
        self.content
            .iter()
            .map(RichNode::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl RichNode {
    /// A paragraph holding `text`, or an empty paragraph for empty input.
    #[must_use]
    pub fn paragraph(text: &str) -> Self {
        let content = if text.is_empty() {
            None
        } else {
            Some(vec![Self::text(text)])
        };

        Self {
            node_type: PARAGRAPH_TYPE.to_string(),
            attrs: None,
            content,
            marks: None,
            text: None,
        }
    }

    /// A text leaf.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            node_type: TEXT_TYPE.to_string(),
            attrs: None,
            content: None,
            marks: None,
            text: Some(text.to_string()),
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|text| !text.is_empty()) {
            return text.to_string();
        }

        self.content
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(Self::text_content)
            .collect()
    }
}
