//! The block-tree normalizer.
//!
//! ```text
//! Block ──▶ walker ──┬─▶ text::resolve     (anchors → text)
//!                    ├─▶ bbox::normalize   (polygon → [minX, minY, maxX, maxY])
//!                    ├─▶ table::build_grid (rows → structuredRows / simpleMatrix)
//!                    └─▶ crop::Cropper     (visual region → images/block_<id>.png)
//! ```
//!
//! Everything here is synchronous and reads only the document text and the
//! page rasters; the cropper's file writes are the only I/O.

pub mod bbox;
pub mod crop;
pub mod table;
pub mod text;
pub mod walker;

pub use bbox::normalize;
pub use crop::{
    crop_file_name, pixel_rect, sanitize_id, CropOutcome, CropRecord, Cropper, PixelRect,
    IMAGES_DIR,
};
pub use table::{build_grid, Slot, TableKind};
pub use text::{resolve, FullText};
pub use walker::{WalkOutput, Walker, DEFAULT_MAX_DEPTH};
