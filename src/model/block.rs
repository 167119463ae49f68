//! Typed view of a layout-analysis block.
//!
//! The wire format is loose: any field may be missing, null, or of the wrong
//! shape, and a block may in principle carry more than one payload. All of
//! that is resolved here, once, while deserializing. Downstream code only
//! ever sees a [`Block`] whose optional fields are real `Option`s and whose
//! content is exactly one [`Payload`] variant.
//!
//! Payload precedence when several are present: table, then image, then
//! list (which keeps any accompanying text payload), then text.

use super::lenient;
use serde::Deserialize;

/// Identifier used for blocks that do not carry one.
pub const UNKNOWN_ID: &str = "unknown";

/// Semantic labels that mark a text block as a visual region.
pub const VISUAL_LABELS: [&str; 4] = ["image", "figure", "chart", "diagram"];

/// Whether `label` names a visual region (case-insensitive).
pub fn is_visual_label(label: &str) -> bool {
    VISUAL_LABELS
        .iter()
        .any(|visual| visual.eq_ignore_ascii_case(label.trim()))
}

/// One node of the layout-analysis block tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawBlock")]
pub struct Block {
    pub id: Option<String>,
    pub page_span: Option<PageSpan>,
    pub layout: Layout,
    pub payload: Payload,
}

impl Block {
    /// Block identifier, or [`UNKNOWN_ID`].
    pub fn id(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_ID)
    }

    /// Whether the block carries a non-empty identifier.
    pub fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// 1-based page number taken from the start of the page span.
    ///
    /// Missing, zero, or negative values resolve to page 1.
    pub fn page(&self) -> u32 {
        self.page_span
            .as_ref()
            .and_then(|span| span.page_start)
            .filter(|&page| page >= 1)
            .map(|page| u32::try_from(page).unwrap_or(u32::MAX))
            .unwrap_or(1)
    }
}

/// The single content payload of a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    Table(TableBlock),
    Image(ImageBlock),
    /// A list keeps its text payload, which commonly holds the nested items.
    List {
        list: ListBlock,
        text: Option<TextBlock>,
    },
    Text(TextBlock),
    #[default]
    Empty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpan {
    #[serde(default, alias = "page_start", deserialize_with = "lenient::integer")]
    pub page_start: Option<i64>,
    #[serde(default, alias = "page_end", deserialize_with = "lenient::integer")]
    pub page_end: Option<i64>,
}

/// Position and text location of a block or table cell.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default, alias = "bounding_poly", deserialize_with = "lenient::option")]
    pub bounding_poly: Option<BoundingPoly>,
    #[serde(default, alias = "text_anchor", deserialize_with = "lenient::option")]
    pub text_anchor: Option<TextAnchor>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingPoly {
    #[serde(default, alias = "normalized_vertices", deserialize_with = "lenient::seq")]
    pub normalized_vertices: Vec<Vertex>,
}

/// A normalized vertex. Protobuf-JSON omits zero coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Vertex {
    #[serde(default, deserialize_with = "lenient::float")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub y: Option<f64>,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x.unwrap_or(0.0)
    }

    pub fn y(&self) -> f64 {
        self.y.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    #[serde(default, alias = "text_segments", deserialize_with = "lenient::seq")]
    pub text_segments: Vec<TextSegment>,
}

impl TextAnchor {
    pub fn from_ranges(ranges: &[(i64, i64)]) -> Self {
        Self {
            text_segments: ranges
                .iter()
                .map(|&(start, end)| TextSegment {
                    start_index: Some(start),
                    end_index: Some(end),
                })
                .collect(),
        }
    }
}

/// Half-open character range into the document text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default, alias = "start_index", deserialize_with = "lenient::integer")]
    pub start_index: Option<i64>,
    #[serde(default, alias = "end_index", deserialize_with = "lenient::integer")]
    pub end_index: Option<i64>,
}

impl TextSegment {
    pub fn start(&self) -> i64 {
        self.start_index.unwrap_or(0)
    }

    pub fn end(&self) -> i64 {
        self.end_index.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// Inline text, as emitted by newer layout-parser versions.
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: Option<String>,
    /// Semantic type (`heading-1`, `paragraph`, `figure`, ...).
    #[serde(default, rename = "type", alias = "type_", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub blocks: Vec<Block>,
}

impl TextBlock {
    /// Semantic type, if non-empty.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Whether the semantic type marks this block as a visual region.
    pub fn is_visual(&self) -> bool {
        self.kind().is_some_and(is_visual_label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBlock {
    #[serde(default, alias = "list_entries", deserialize_with = "lenient::seq")]
    pub list_entries: Vec<ListEntry>,
    #[serde(default, rename = "type", alias = "type_", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListEntry {
    #[serde(default, deserialize_with = "lenient::seq")]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    #[serde(default, alias = "mime_type", deserialize_with = "lenient::string")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    #[serde(default, alias = "header_rows", deserialize_with = "lenient::seq")]
    pub header_rows: Vec<TableRow>,
    #[serde(default, alias = "body_rows", deserialize_with = "lenient::seq")]
    pub body_rows: Vec<TableRow>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableRow {
    #[serde(default, deserialize_with = "lenient::seq")]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    #[serde(default, deserialize_with = "lenient::option")]
    pub layout: Option<Layout>,
    #[serde(default, alias = "row_span", deserialize_with = "lenient::integer")]
    pub row_span: Option<i64>,
    #[serde(default, alias = "col_span", deserialize_with = "lenient::integer")]
    pub col_span: Option<i64>,
    /// Cell content as nested blocks, used when there is no text anchor.
    #[serde(default, deserialize_with = "lenient::seq")]
    pub blocks: Vec<Block>,
}

// ── Wire shape ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    #[serde(default, alias = "block_id", deserialize_with = "lenient::string")]
    block_id: Option<String>,
    #[serde(default, alias = "page_span", deserialize_with = "lenient::option")]
    page_span: Option<PageSpan>,
    #[serde(default, deserialize_with = "lenient::option")]
    layout: Option<Layout>,
    /// Layout-parser responses put the polygon directly on the block.
    #[serde(default, alias = "bounding_box", deserialize_with = "lenient::option")]
    bounding_box: Option<BoundingPoly>,
    #[serde(default, alias = "table_block", deserialize_with = "lenient::option")]
    table_block: Option<TableBlock>,
    #[serde(default, alias = "image_block", deserialize_with = "lenient::option")]
    image_block: Option<ImageBlock>,
    #[serde(default, alias = "list_block", deserialize_with = "lenient::option")]
    list_block: Option<ListBlock>,
    #[serde(default, alias = "text_block", deserialize_with = "lenient::option")]
    text_block: Option<TextBlock>,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let mut layout = raw.layout.unwrap_or_default();
        if layout.bounding_poly.is_none() {
            layout.bounding_poly = raw.bounding_box;
        }

        let payload = match (raw.table_block, raw.image_block, raw.list_block) {
            (Some(table), _, _) => Payload::Table(table),
            (None, Some(image), _) => Payload::Image(image),
            (None, None, Some(list)) => Payload::List {
                list,
                text: raw.text_block,
            },
            (None, None, None) => raw.text_block.map_or(Payload::Empty, Payload::Text),
        };

        Self {
            id: raw.block_id,
            page_span: raw.page_span,
            layout,
            payload,
        }
    }
}
