//! The raw layout-analysis result as returned by the analyzer.

use super::block::Block;
use super::lenient;
use serde::Deserialize;
use serde_json::Value;

/// A Document AI `Document`, reduced to the parts the tree builder reads.
///
/// Every path is optional: a result without text, pages, or a
/// `documentLayout` still decodes and simply produces an empty tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLayoutResult {
    #[serde(default, alias = "fullText", alias = "full_text", deserialize_with = "lenient::string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub pages: Vec<Value>,
    #[serde(default, alias = "document_layout", deserialize_with = "lenient::option")]
    pub document_layout: Option<DocumentLayout>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentLayout {
    #[serde(default, deserialize_with = "lenient::seq")]
    pub blocks: Vec<Block>,
}

impl RawLayoutResult {
    /// Decode a saved analysis.
    ///
    /// Accepts either a bare `Document` or a `ProcessResponse` wrapper
    /// (`{"document": {...}}`) as produced by the REST endpoint.
    ///
    /// There is no nesting limit here; overly deep block trees are cut by
    /// the walker's depth cap instead.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, serde_json::Error> {
        let document = match value {
            Value::Object(mut map) if map.get("document").is_some_and(Value::is_object) => {
                map.remove("document").unwrap_or_default()
            }
            other => other,
        };
        lenient::from_value(document)
    }

    /// The full document text, or `""`.
    pub fn full_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Root blocks of `documentLayout.blocks`, or an empty slice.
    pub fn root_blocks(&self) -> &[Block] {
        self.document_layout
            .as_ref()
            .map(|layout| layout.blocks.as_slice())
            .unwrap_or(&[])
    }
}
