//! Caller-owned document type flowing through the ranker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of retrievable text plus free-form metadata.
///
/// The ranker assigns [`score`](Document::score) during a run; it is `None`
/// until then. Documents are owned by the caller and returned reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Textual content scored against the query.
    pub content: String,

    /// Free-form metadata. Configured fields can be embedded into the
    /// text seen by the cross-encoder.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,

    /// Relevance score assigned by the most recent ranking run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    /// Creates a document with the given content and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            meta: Map::new(),
            score: None,
        }
    }

    /// Adds a metadata entry (builder style).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}
