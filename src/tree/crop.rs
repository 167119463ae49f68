//! Image-region cropping: page raster + normalized box → PNG on disk.
//!
//! Every early exit is a [`CropSkip`], never an error: a visual node without
//! a crop is still a valid node. Files land in `<output_dir>/images/` as
//! `block_<sanitizedId>.png`; blocks without an id, or whose id was already
//! written, get `block_<id>_p<page>_<n>.png` instead.

use super::bbox;
use crate::error::CropSkip;
use crate::model::{BoundingBox, Block};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Name of the crop directory inside the output directory.
pub const IMAGES_DIR: &str = "images";

/// Result of one crop attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CropOutcome {
    Saved { path: PathBuf },
    Skipped { reason: CropSkip },
}

impl CropOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CropOutcome::Saved { path } => Some(path),
            CropOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, CropOutcome::Saved { .. })
    }
}

impl From<CropSkip> for CropOutcome {
    fn from(reason: CropSkip) -> Self {
        CropOutcome::Skipped { reason }
    }
}

/// One crop attempt as seen by the walker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRecord {
    pub block_id: String,
    pub page: u32,
    pub outcome: CropOutcome,
}

impl CropRecord {
    pub fn is_saved(&self) -> bool {
        self.outcome.is_saved()
    }
}

/// Crop region in pixels, half-open on the max edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }
}

/// Map a normalized box onto a `width × height` raster.
///
/// Coordinates are floored and clamped to the raster. Returns `None` when
/// the resulting region has no area.
pub fn pixel_rect(b: &BoundingBox, width: u32, height: u32) -> Option<PixelRect> {
    let scale = |v: f64, size: u32| -> u32 {
        let px = (v * f64::from(size)).floor();
        if px.is_nan() || px <= 0.0 {
            0
        } else if px >= f64::from(size) {
            size
        } else {
            px as u32
        }
    };

    let rect = PixelRect {
        x_min: scale(b.min_x, width),
        y_min: scale(b.min_y, height),
        x_max: scale(b.max_x, width),
        y_max: scale(b.max_y, height),
    };
    (rect.x_max > rect.x_min && rect.y_max > rect.y_min).then_some(rect)
}

/// Make a block id safe to use as a file name component.
pub fn sanitize_id(id: &str) -> String {
    id.replace(['/', '\\'], "_")
}

/// File name of the crop for block `id`.
pub fn crop_file_name(id: &str) -> String {
    format!("block_{}.png", sanitize_id(id))
}

/// Writes crops of visual blocks into an images directory.
///
/// Each cropper hands out every file name at most once.
#[derive(Debug)]
pub struct Cropper {
    images_dir: PathBuf,
    claimed: Mutex<HashSet<String>>,
}

impl Cropper {
    /// Crops go to `<output_dir>/images/`. Nothing is created until the
    /// first crop is written.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            images_dir: output_dir.as_ref().join(IMAGES_DIR),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Crop the region of `block` from the raster of its page.
    pub fn crop(&self, block: &Block, rasters: &[DynamicImage]) -> CropOutcome {
        let Some(poly) = block.layout.bounding_poly.as_ref() else {
            return CropSkip::NoBoundingPoly.into();
        };
        if rasters.is_empty() {
            return CropSkip::NoRasters.into();
        }

        let page = block.page();
        let Some(raster) = rasters.get(page as usize - 1) else {
            return CropSkip::PageOutOfRange {
                page,
                available: rasters.len(),
            }
            .into();
        };

        let Some(region) = bbox::normalize(Some(poly)) else {
            return CropSkip::NoVertices.into();
        };
        let Some(rect) = pixel_rect(&region, raster.width(), raster.height()) else {
            return CropSkip::Degenerate.into();
        };

        let path = self.images_dir.join(self.claim_file_name(block));
        match self.write(raster, rect, &path) {
            Ok(()) => {
                debug!(
                    "Cropped block {} (page {}) → {}x{} px at {}",
                    block.id(),
                    page,
                    rect.width(),
                    rect.height(),
                    path.display()
                );
                CropOutcome::Saved { path }
            }
            Err(e) => {
                warn!("Crop of block {} failed: {}", block.id(), e);
                let _ = fs::remove_file(&path);
                CropSkip::WriteFailed {
                    detail: e.to_string(),
                }
                .into()
            }
        }
    }

    /// `block_<id>.png` for the first block with a given id, otherwise the
    /// first free `block_<id>_p<page>_<n>.png`.
    fn claim_file_name(&self, block: &Block) -> String {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        let stem = sanitize_id(block.id());
        if block.has_id() {
            let name = crop_file_name(&stem);
            if claimed.insert(name.clone()) {
                return name;
            }
        }

        let page = block.page();
        let mut n = 1usize;
        loop {
            let name = crop_file_name(&format!("{stem}_p{page}_{n}"));
            if claimed.insert(name.clone()) {
                return name;
            }
            n += 1;
        }
    }

    fn write(&self, raster: &DynamicImage, rect: PixelRect, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(&self.images_dir)?;
        let cropped = raster.crop_imm(rect.x_min, rect.y_min, rect.width(), rect.height());

        let mut writer = BufWriter::new(File::create(path)?);
        cropped
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(std::io::Error::other)?;
        writer.flush()
    }
}
