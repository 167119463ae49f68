//! The normalized output tree.
//!
//! These are the types written to disk. JSON keys are camelCase and optional
//! members are omitted rather than written as `null`, so a node only carries
//! the fields its classification allows (`data` on tables, `filePath` on
//! cropped visuals, `text` on text-bearing nodes).

use super::block::{is_visual_label, UNKNOWN_ID};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Semantic classification of an output node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    Table,
    /// Image-like region; keeps the source label (`image`, `Figure`, ...).
    Visual(String),
    List,
    /// Text or container; the source's semantic type (`heading-1`, ...).
    Text(String),
    Unknown,
}

impl NodeType {
    /// Classify a serialized `type` label.
    ///
    /// Used when reading output JSON back, where only the label survives.
    /// The walker types nodes by payload instead, so a text block labelled
    /// `table` stays a text node.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "table" => NodeType::Table,
            "list" => NodeType::List,
            l if is_visual_label(l) => NodeType::Visual(l.to_string()),
            l => NodeType::text(l),
        }
    }

    /// A text node with semantic type `label`, or `Unknown` when blank.
    pub fn text(label: &str) -> Self {
        match label.trim() {
            "" | UNKNOWN_ID => NodeType::Unknown,
            l => NodeType::Text(l.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Table => "table",
            NodeType::Visual(label) | NodeType::Text(label) => label,
            NodeType::List => "list",
            NodeType::Unknown => UNKNOWN_ID,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, NodeType::Table)
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, NodeType::Visual(_))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(NodeType::from_label(&label))
    }
}

/// Axis-aligned box in normalized page coordinates.
///
/// Serialized as `[minX, minY, maxX, maxY]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    /// Fraction of the page covered by the box.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_x, min_y, max_x, max_y]: [f64; 4]) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

/// One cell of a reconstructed table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCellData {
    pub text: String,
    pub row_span: u32,
    pub col_span: u32,
}

/// Table payload of a `table` node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    /// Header rows followed by body rows, cells in source order.
    pub structured_rows: Vec<Vec<TableCellData>>,
    /// The same shape as `structured_rows`, text only.
    pub simple_matrix: Vec<Vec<String>>,
}

/// A node of the output tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub children: Vec<OutputNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TableData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Model-written description, attached by [`crate::pipeline::narrate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl OutputNode {
    pub fn new(
        id: impl Into<String>,
        node_type: NodeType,
        page: u32,
        bbox: Option<BoundingBox>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            page,
            bbox,
            children: Vec::new(),
            text: None,
            data: None,
            file_path: None,
            narrative: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_children(mut self, children: Vec<OutputNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_data(mut self, data: TableData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_file_path(mut self, path: Option<PathBuf>) -> Self {
        self.file_path = path;
        self
    }

    /// This node and all of its descendants, depth-first, in document order.
    pub fn descendants(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }
}

/// Depth-first pre-order iterator over a node forest.
pub struct Preorder<'a> {
    stack: Vec<&'a OutputNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a OutputNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub filename: String,
    pub page_count: usize,
    /// Length of the full text in characters.
    pub text_length: usize,
}

/// The complete output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub metadata: DocumentMetadata,
    pub structure: Vec<OutputNode>,
}

impl DocumentResult {
    /// Every node of the tree, depth-first, in document order.
    pub fn nodes(&self) -> Preorder<'_> {
        Preorder {
            stack: self.structure.iter().rev().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_type_labels_round_trip() {
        for label in ["table", "list", "unknown", "Figure", "heading-2", "paragraph"] {
            assert_eq!(NodeType::from_label(label).as_str(), label);
        }
        assert_eq!(NodeType::from_label("Chart"), NodeType::Visual("Chart".into()));
        assert_eq!(NodeType::from_label(""), NodeType::Unknown);
    }

    #[test]
    fn text_labels_never_become_structural_types() {
        assert_eq!(NodeType::text("table"), NodeType::Text("table".into()));
        assert_eq!(NodeType::text(" list "), NodeType::Text("list".into()));
        assert_eq!(NodeType::text("unknown"), NodeType::Unknown);
        assert!(!NodeType::text("table").is_table());
    }

    #[test]
    fn optional_members_are_omitted() {
        let node = OutputNode::new("1", NodeType::Text("paragraph".into()), 2, None);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({"id": "1", "type": "paragraph", "page": 2, "children": []})
        );
    }

    #[test]
    fn camel_case_keys_and_bbox_array() {
        let node = OutputNode::new(
            "t",
            NodeType::Table,
            1,
            Some(BoundingBox::from([0.1, 0.2, 0.3, 0.4])),
        )
        .with_data(TableData {
            structured_rows: vec![vec![TableCellData {
                text: "a".into(),
                row_span: 1,
                col_span: 2,
            }]],
            simple_matrix: vec![vec!["a".into()]],
        });
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["bbox"], json!([0.1, 0.2, 0.3, 0.4]));
        assert_eq!(value["data"]["structuredRows"][0][0]["colSpan"], json!(2));
        assert_eq!(value["data"]["simpleMatrix"], json!([["a"]]));
    }

    #[test]
    fn preorder_visits_in_document_order() {
        let leaf = |id: &str| OutputNode::new(id, NodeType::Unknown, 1, None);
        let doc = DocumentResult {
            metadata: DocumentMetadata {
                filename: "x.pdf".into(),
                page_count: 1,
                text_length: 0,
            },
            structure: vec![
                leaf("a").with_children(vec![leaf("a1"), leaf("a2").with_children(vec![leaf("a2i")])]),
                leaf("b"),
            ],
        };
        let ids: Vec<&str> = doc.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a", "a1", "a2", "a2i", "b"]);
    }

    #[test]
    fn bbox_area_is_never_negative() {
        let inverted = BoundingBox::from([0.5, 0.5, 0.1, 0.1]);
        assert_eq!(inverted.area(), 0.0);
        let b = BoundingBox::from([0.0, 0.0, 0.5, 0.2]);
        assert!((b.area() - 0.1).abs() < 1e-12);
    }
}
