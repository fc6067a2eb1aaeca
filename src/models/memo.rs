//! Memo model: a single question/answer flashcard.

use serde::{Deserialize, Serialize};

/// Formatting flags applied to a run of memo content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<bool>,
}

impl ContentAttributes {
    /// `true` when no flag is set at all.
    pub fn is_empty(&self) -> bool {
        self.bold.is_none() && self.italic.is_none() && self.underline.is_none() && self.code_block.is_none()
    }
}

/// A run of text inside a memo question or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRun {
    pub insert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ContentAttributes>,
}

impl ContentRun {
    #[cfg(test)]
    pub fn plain(insert: impl Into<String>) -> Self {
        Self {
            insert: insert.into(),
            attributes: None,
        }
    }
}

/// A flashcard. Identity is `id`, unique within its parent collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Memo {
    pub id: String,
    pub question: Vec<ContentRun>,
    pub answer: Vec<ContentRun>,
}
