//! Recursive block-tree walker.
//!
//! Each block is classified once, by its [`Payload`]:
//!
//! | payload                         | node type     | children |
//! |---------------------------------|---------------|----------|
//! | table                           | `table`       | none     |
//! | image, or text typed as visual  | source label  | none     |
//! | list                            | `list`        | yes      |
//! | text                            | semantic type | yes      |
//! | nothing                         | dropped       |          |
//!
//! Nodes are built bottom-up: a parent is assembled from the values its
//! children return, and nothing is mutated afterwards.

use super::crop::{CropRecord, Cropper};
use super::text::{resolve, FullText};
use super::{bbox, table};
use crate::model::{Block, NodeType, OutputNode, Payload, TextBlock};
use image::DynamicImage;
use tracing::warn;

/// Default nesting limit for the walk.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Structure produced by [`Walker::walk`].
#[derive(Debug, Clone, Default)]
pub struct WalkOutput {
    pub structure: Vec<OutputNode>,
    /// Every crop attempt, in document order.
    pub crops: Vec<CropRecord>,
}

/// Walks a block tree against one document's text and page rasters.
pub struct Walker<'a> {
    text: &'a FullText,
    rasters: &'a [DynamicImage],
    cropper: Option<&'a Cropper>,
    max_depth: usize,
}

impl<'a> Walker<'a> {
    pub fn new(text: &'a FullText, rasters: &'a [DynamicImage]) -> Self {
        Self {
            text,
            rasters,
            cropper: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Write crops of visual blocks through `cropper`. Without one, visual
    /// nodes are emitted with no `filePath`.
    pub fn with_cropper(mut self, cropper: &'a Cropper) -> Self {
        self.cropper = Some(cropper);
        self
    }

    /// Blocks nested deeper than `depth` are dropped. Roots are depth 1.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Visit every root block, keeping the nodes that survive.
    pub fn walk(&self, roots: &[Block]) -> WalkOutput {
        let mut crops = Vec::new();
        let structure = roots
            .iter()
            .filter_map(|block| self.visit_at(block, 1, &mut crops))
            .collect();
        WalkOutput { structure, crops }
    }

    /// Convert one block (and its subtree) to a node.
    ///
    /// Returns `None` for blocks without any payload.
    pub fn visit(&self, block: &Block) -> Option<OutputNode> {
        self.visit_at(block, 1, &mut Vec::new())
    }

    fn visit_at(
        &self,
        block: &Block,
        depth: usize,
        crops: &mut Vec<CropRecord>,
    ) -> Option<OutputNode> {
        if depth > self.max_depth {
            warn!(
                "Dropping block {} on page {}: nesting deeper than {}",
                block.id(),
                block.page(),
                self.max_depth
            );
            return None;
        }

        let node = OutputNode::new(
            block.id(),
            node_type(&block.payload),
            block.page(),
            bbox::normalize(block.layout.bounding_poly.as_ref()),
        );

        match &block.payload {
            Payload::Table(t) => Some(node.with_data(table::build_grid(t, self.text))),

            Payload::Image(_) => Some(self.visual(node, "image", block, crops)),
            Payload::Text(t) if t.is_visual() => {
                let label = t.kind().unwrap_or("image");
                Some(self.visual(node, label, block, crops))
            }

            Payload::List { list, text } => {
                let mut children = match text {
                    Some(t) => self.children(&t.blocks, depth, crops),
                    None => Vec::new(),
                };
                for entry in &list.list_entries {
                    children.extend(self.children(&entry.blocks, depth, crops));
                }

                let node = node.with_children(children);
                match text {
                    Some(t) => Some(node.with_text(self.block_text(block, t))),
                    None => {
                        let anchored = resolve(block.layout.text_anchor.as_ref(), self.text);
                        Some(if anchored.is_empty() {
                            node
                        } else {
                            node.with_text(anchored)
                        })
                    }
                }
            }

            Payload::Text(t) => {
                let children = self.children(&t.blocks, depth, crops);
                Some(
                    node.with_text(self.block_text(block, t))
                        .with_children(children),
                )
            }

            Payload::Empty => None,
        }
    }

    fn children(
        &self,
        blocks: &[Block],
        depth: usize,
        crops: &mut Vec<CropRecord>,
    ) -> Vec<OutputNode> {
        blocks
            .iter()
            .filter_map(|child| self.visit_at(child, depth + 1, crops))
            .collect()
    }

    /// Anchored text, or the inline text when the anchor yields nothing.
    fn block_text(&self, block: &Block, payload: &TextBlock) -> String {
        let anchored = resolve(block.layout.text_anchor.as_ref(), self.text);
        if !anchored.is_empty() {
            return anchored;
        }
        payload.text.as_deref().unwrap_or("").trim().to_string()
    }

    fn visual(
        &self,
        mut node: OutputNode,
        label: &str,
        block: &Block,
        crops: &mut Vec<CropRecord>,
    ) -> OutputNode {
        node.node_type = NodeType::Visual(label.to_string());

        let Some(cropper) = self.cropper else {
            return node;
        };
        let outcome = cropper.crop(block, self.rasters);
        let path = outcome.path().map(|p| p.to_path_buf());
        crops.push(CropRecord {
            block_id: node.id.clone(),
            page: node.page,
            outcome,
        });
        node.with_file_path(path)
    }
}

/// Type implied by the payload. A text block's semantic label never makes
/// it a table or a list.
fn node_type(payload: &Payload) -> NodeType {
    match payload {
        Payload::Table(_) => NodeType::Table,
        Payload::Image(_) => NodeType::Visual("image".to_string()),
        Payload::List { .. } => NodeType::List,
        Payload::Text(t) => t.kind().map_or(NodeType::Unknown, NodeType::text),
        Payload::Empty => NodeType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CropSkip;
    use crate::tree::CropOutcome;
    use image::{Rgba, RgbaImage};
    use serde_json::{json, Value};

    fn blocks(value: Value) -> Vec<Block> {
        serde_json::from_value(value).unwrap()
    }

    fn block(value: Value) -> Block {
        serde_json::from_value(value).unwrap()
    }

    fn anchor(ranges: &[(i64, i64)]) -> Value {
        let segments: Vec<Value> = ranges
            .iter()
            .map(|(s, e)| json!({"startIndex": s, "endIndex": e}))
            .collect();
        json!({"textSegments": segments})
    }

    #[test]
    fn heading_with_two_paragraphs() {
        let text = FullText::new("Hello world extra");
        let paragraph = |id: &str| {
            json!({
                "blockId": id,
                "layout": {"textAnchor": anchor(&[(0, 5), (10, 15)])},
                "textBlock": {"type": "paragraph"}
            })
        };
        let heading = block(json!({
            "blockId": "h",
            "textBlock": {"type": "heading", "blocks": [paragraph("p1"), paragraph("p2")]}
        }));

        let node = Walker::new(&text, &[]).visit(&heading).unwrap();
        assert_eq!(node.node_type, NodeType::Text("heading".into()));
        assert_eq!(node.children.len(), 2);
        for child in &node.children {
            assert_eq!(child.text.as_deref(), Some("Hello extra"));
            assert!(child.children.is_empty());
        }
    }

    #[test]
    fn payloadless_blocks_are_dropped_without_placeholders() {
        let text = FullText::new("abc");
        let roots = blocks(json!([
            {"blockId": "a", "textBlock": {"text": "first"}},
            {"blockId": "ghost", "layout": {"textAnchor": anchor(&[(0, 3)])}},
            {"blockId": "b", "textBlock": {"blocks": [{"blockId": "inner-ghost"}, {"textBlock": {}}]}}
        ]));

        let out = Walker::new(&text, &[]).walk(&roots);
        let ids: Vec<&str> = out.structure.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(out.structure[1].children.len(), 1);
        assert_eq!(out.structure[1].children[0].id, "unknown");
        assert!(Walker::new(&text, &[]).visit(&roots[1]).is_none());
    }

    #[test]
    fn list_with_text_payload_keeps_children() {
        let text = FullText::new("item one");
        let list = block(json!({
            "blockId": "l",
            "listBlock": {},
            "textBlock": {"blocks": [
                {"blockId": "i1", "layout": {"textAnchor": anchor(&[(0, 8)])}, "textBlock": {"type": "paragraph"}}
            ]}
        }));
        let node = Walker::new(&text, &[]).visit(&list).unwrap();
        assert_eq!(node.node_type, NodeType::List);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].text.as_deref(), Some("item one"));
    }

    #[test]
    fn list_entries_follow_text_children() {
        let text = FullText::new("");
        let list = block(json!({
            "listBlock": {"listEntries": [
                {"blocks": [{"blockId": "e1", "textBlock": {"text": "one"}}]},
                {"blocks": [{"blockId": "e2", "textBlock": {"text": "two"}}]}
            ]},
            "textBlock": {"blocks": [{"blockId": "t", "textBlock": {"text": "intro"}}]}
        }));
        let node = Walker::new(&text, &[]).visit(&list).unwrap();
        let ids: Vec<&str> = node.children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["t", "e1", "e2"]);

        let bare = block(json!({"listBlock": {}}));
        let node = Walker::new(&text, &[]).visit(&bare).unwrap();
        assert_eq!(node.node_type, NodeType::List);
        assert!(node.text.is_none());
    }

    #[test]
    fn tables_are_leaves_with_data() {
        let text = FullText::new("A B 1 2 3 4");
        let cell = |s: i64| json!({"layout": {"textAnchor": anchor(&[(s, s + 1)])}});
        let t = block(json!({
            "blockId": "t1",
            "pageSpan": {"pageStart": 3},
            "tableBlock": {
                "headerRows": [{"cells": [cell(0), cell(2)]}],
                "bodyRows": [
                    {"cells": [cell(4), cell(6)]},
                    {"cells": [cell(8), {"layout": {"textAnchor": anchor(&[(10, 40)])}}]}
                ]
            },
            "textBlock": {"blocks": [{"textBlock": {"text": "ignored"}}]}
        }));
        let node = Walker::new(&text, &[]).visit(&t).unwrap();
        assert_eq!(node.node_type, NodeType::Table);
        assert_eq!(node.page, 3);
        assert!(node.children.is_empty());
        assert!(node.text.is_none());
        let data = node.data.unwrap();
        assert_eq!(
            data.simple_matrix,
            vec![vec!["A", "B"], vec!["1", "2"], vec!["3", ""]]
        );
    }

    #[test]
    fn visual_text_blocks_are_image_leaves() {
        let text = FullText::new("");
        let fig = block(json!({
            "textBlock": {"type": "Figure", "blocks": [{"textBlock": {"text": "caption"}}]}
        }));
        let node = Walker::new(&text, &[]).visit(&fig).unwrap();
        assert_eq!(node.node_type, NodeType::Visual("Figure".into()));
        assert!(node.children.is_empty());
        assert!(node.file_path.is_none());

        let img = block(json!({"imageBlock": {"mimeType": "image/png"}}));
        let node = Walker::new(&text, &[]).visit(&img).unwrap();
        assert_eq!(node.node_type.as_str(), "image");
    }

    #[test]
    fn crops_are_attached_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cropper = Cropper::new(dir.path());
        let text = FullText::new("");
        let rasters = vec![
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]))),
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]))),
        ];
        let poly = json!({"normalizedVertices": [{"x": 0.1, "y": 0.1}, {"x": 0.5, "y": 0.4}]});
        let roots = blocks(json!([
            {"blockId": "ok", "pageSpan": {"pageStart": 2}, "layout": {"boundingPoly": poly}, "imageBlock": {}},
            {"blockId": "far", "pageSpan": {"pageStart": 5}, "layout": {"boundingPoly": poly}, "imageBlock": {}}
        ]));

        let out = Walker::new(&text, &rasters).with_cropper(&cropper).walk(&roots);
        assert_eq!(
            out.structure[0].file_path.as_deref(),
            Some(dir.path().join("images/block_ok.png").as_path())
        );
        assert!(out.structure[1].file_path.is_none());
        assert_eq!(out.crops.len(), 2);
        assert!(out.crops[0].is_saved());
        assert_eq!(
            out.crops[1].outcome,
            CropOutcome::Skipped {
                reason: CropSkip::PageOutOfRange { page: 5, available: 2 }
            }
        );
    }

    #[test]
    fn anonymous_visuals_never_share_a_crop() {
        let dir = tempfile::tempdir().unwrap();
        let cropper = Cropper::new(dir.path());
        let text = FullText::new("");
        let rasters = vec![DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 255])))];
        let poly = json!({"normalizedVertices": [{"x": 0.0, "y": 0.0}, {"x": 0.5, "y": 0.5}]});
        let roots = blocks(json!([
            {"layout": {"boundingPoly": poly}, "imageBlock": {}},
            {"layout": {"boundingPoly": poly}, "imageBlock": {}}
        ]));

        let out = Walker::new(&text, &rasters).with_cropper(&cropper).walk(&roots);
        let first = out.structure[0].file_path.as_ref().unwrap();
        let second = out.structure[1].file_path.as_ref().unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn structural_labels_on_text_blocks_stay_text() {
        let text = FullText::new("");
        let roots = blocks(json!([
            {"blockId": "t", "textBlock": {"type": "table", "text": "Table 1", "blocks": [
                {"blockId": "c", "textBlock": {"text": "caption"}}
            ]}},
            {"blockId": "l", "textBlock": {"type": "list", "text": "items"}}
        ]));

        let out = Walker::new(&text, &[]).walk(&roots);
        let table_like = &out.structure[0];
        assert_eq!(table_like.node_type, NodeType::Text("table".into()));
        assert!(!table_like.node_type.is_table());
        assert!(table_like.data.is_none());
        assert_eq!(table_like.text.as_deref(), Some("Table 1"));
        assert_eq!(table_like.children.len(), 1);
        assert_eq!(out.structure[1].node_type, NodeType::Text("list".into()));
    }

    #[test]
    fn inline_text_is_the_fallback() {
        let text = FullText::new("anchored");
        let anchored = block(json!({
            "layout": {"textAnchor": anchor(&[(0, 8)])},
            "textBlock": {"text": "inline"}
        }));
        let inline = block(json!({"textBlock": {"text": "  inline  "}}));
        let walker = Walker::new(&text, &[]);
        assert_eq!(walker.visit(&anchored).unwrap().text.as_deref(), Some("anchored"));
        assert_eq!(walker.visit(&inline).unwrap().text.as_deref(), Some("inline"));
    }

    #[test]
    fn scaffold_defaults() {
        let text = FullText::new("");
        let node = Walker::new(&text, &[])
            .visit(&block(json!({"textBlock": {}})))
            .unwrap();
        assert_eq!(node.id, "unknown");
        assert_eq!(node.node_type, NodeType::Unknown);
        assert_eq!(node.page, 1);
        assert!(node.bbox.is_none());
        assert_eq!(node.text.as_deref(), Some(""));
    }

    #[test]
    fn nesting_beyond_the_cap_is_dropped() {
        let mut value = json!({"blockId": "leaf", "textBlock": {}});
        for i in 0..5 {
            value = json!({"blockId": format!("d{i}"), "textBlock": {"blocks": [value]}});
        }
        let text = FullText::new("");
        let root = block(value);

        let deep = Walker::new(&text, &[]).visit(&root).unwrap();
        assert_eq!(deep.descendants().count(), 6);

        let capped = Walker::new(&text, &[]).max_depth(3).visit(&root).unwrap();
        assert_eq!(capped.descendants().count(), 3);
    }
}
