//! Data model: the loose input block tree and the strict output tree.
//!
//! ```text
//! RawLayoutResult ──▶ Block (typed, one Payload) ──▶ OutputNode
//!   (wire JSON)        resolved at decode time        (written to disk)
//! ```

pub mod block;
pub mod document;
pub mod lenient;
pub mod output;

pub use block::{
    is_visual_label, Block, BoundingPoly, ImageBlock, Layout, ListBlock, ListEntry, PageSpan,
    Payload, TableBlock, TableCell, TableRow, TextAnchor, TextBlock, TextSegment, Vertex,
    UNKNOWN_ID, VISUAL_LABELS,
};
pub use document::{DocumentLayout, RawLayoutResult};
pub use output::{
    BoundingBox, DocumentMetadata, DocumentResult, NodeType, OutputNode, Preorder, TableCellData,
    TableData,
};
