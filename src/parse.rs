//! Document assembly: analysis result + page rasters → [`DocumentResult`].
//!
//! ## Stages
//!
//! 1. resolve the input (path or URL) and read the PDF bytes
//! 2. run the [`LayoutAnalyzer`]; any failure here is fatal
//! 3. rasterise every page; a failure only disables cropping
//! 4. walk the block tree, writing crops as visual nodes are met
//!
//! Narratives are a separate, optional pass over the finished document
//! ([`crate::pipeline::narrate::narrate_document`]), so a parse never needs
//! a language model.

use crate::config::ParseConfig;
use crate::error::Layout2JsonError;
use crate::model::{DocumentMetadata, DocumentResult, RawLayoutResult};
use crate::pipeline::analyze::LayoutAnalyzer;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render;
use crate::progress::Stage;
use crate::tree::{CropRecord, Cropper, FullText, Walker};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything a parse produces.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub document: DocumentResult,
    /// One record per visual block, saved or skipped.
    pub crops: Vec<CropRecord>,
    pub stats: ParseStats,
    /// Stem of the input file name; names the JSON result.
    pub stem: String,
}

impl ParseOutput {
    /// `<output_dir>/<stem>.json`.
    pub fn json_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.json", self.stem))
    }
}

/// Counts and timings of one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub page_count: usize,
    pub node_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    pub crops_saved: usize,
    pub crops_skipped: usize,
    /// Rendering failed and no crops could be cut.
    pub render_degraded: bool,
    pub analysis_duration_ms: u64,
    pub render_duration_ms: u64,
    pub walk_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Parse a PDF file or URL into a document tree.
///
/// # Errors
/// Returns `Err` only for fatal errors: unreadable input, a file that is
/// not a PDF, or a failed layout analysis. Rendering problems and crop
/// failures are reported in [`ParseOutput::stats`] and
/// [`ParseOutput::crops`].
pub async fn parse(
    input_str: impl AsRef<str>,
    analyzer: &dyn LayoutAnalyzer,
    config: &ParseConfig,
) -> Result<ParseOutput, Layout2JsonError> {
    let input_str = input_str.as_ref();
    info!("Starting parse: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    parse_resolved(&resolved, analyzer, config).await
}

/// Parse a PDF and write `<output_dir>/<stem>.json`.
///
/// Returns the path written and the parse output.
pub async fn parse_to_file(
    input_str: impl AsRef<str>,
    analyzer: &dyn LayoutAnalyzer,
    config: &ParseConfig,
) -> Result<(PathBuf, ParseOutput), Layout2JsonError> {
    let output = parse(input_str, analyzer, config).await?;
    let path = output.json_path(&config.output_dir);

    let write_start = Instant::now();
    notify(config, |cb| cb.on_stage_start(Stage::Write));
    write_document(&output.document, &path).await?;
    notify(config, |cb| {
        cb.on_stage_complete(Stage::Write, write_start.elapsed().as_millis() as u64)
    });

    info!("Wrote {}", path.display());
    Ok((path, output))
}

/// Parse PDF bytes held in memory.
///
/// `file_name` is reported in the metadata and names the JSON result; the
/// bytes are staged in a temporary directory that is removed on return.
pub async fn parse_from_bytes(
    bytes: &[u8],
    file_name: &str,
    analyzer: &dyn LayoutAnalyzer,
    config: &ParseConfig,
) -> Result<ParseOutput, Layout2JsonError> {
    let dir = tempfile::tempdir().map_err(|e| Layout2JsonError::Internal(format!("tempdir: {e}")))?;
    let name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());
    let path = dir.path().join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Layout2JsonError::Internal(format!("tempfile write: {e}")))?;

    // `dir` is dropped (and the file deleted) when this returns
    let resolved = input::resolve_input(&path.to_string_lossy(), config.download_timeout_secs).await?;
    parse_resolved(&resolved, analyzer, config).await
}

/// Synchronous wrapper around [`parse`].
///
/// Creates a temporary tokio runtime internally.
pub fn parse_sync(
    input_str: impl AsRef<str>,
    analyzer: &dyn LayoutAnalyzer,
    config: &ParseConfig,
) -> Result<ParseOutput, Layout2JsonError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Layout2JsonError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(parse(input_str, analyzer, config))
}

/// Serialize `document` as pretty JSON at `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_document(document: &DocumentResult, path: &Path) -> Result<(), Layout2JsonError> {
    let write_failed = |source| Layout2JsonError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| Layout2JsonError::Internal(format!("JSON serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn notify(config: &ParseConfig, f: impl FnOnce(&dyn crate::progress::ParseProgressCallback)) {
    if let Some(ref cb) = config.progress_callback {
        f(cb.as_ref());
    }
}

async fn parse_resolved(
    resolved: &ResolvedInput,
    analyzer: &dyn LayoutAnalyzer,
    config: &ParseConfig,
) -> Result<ParseOutput, Layout2JsonError> {
    let total_start = Instant::now();
    let pdf_path = resolved.path();

    // ── Step 1: Layout analysis ──────────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(Stage::Analyze));
    let analysis_start = Instant::now();
    let bytes = resolved.read_bytes().await?;
    debug!("Read {} bytes from {}", bytes.len(), pdf_path.display());
    let raw = analyzer.analyze(&bytes).await?;
    drop(bytes);
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
    info!(
        "Analysis ({}) returned {} root blocks over {} pages in {}ms",
        analyzer.name(),
        raw.root_blocks().len(),
        raw.page_count(),
        analysis_duration_ms
    );
    notify(config, |cb| cb.on_stage_complete(Stage::Analyze, analysis_duration_ms));

    // ── Step 2: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let mut render_degraded = false;
    let rasters: Vec<DynamicImage> = if config.crop_images {
        notify(config, |cb| cb.on_stage_start(Stage::Render));
        match render::render_pages(pdf_path, config).await {
            Ok(rasters) => {
                info!("Rendered {} pages", rasters.len());
                notify(config, |cb| {
                    cb.on_stage_complete(Stage::Render, render_start.elapsed().as_millis() as u64)
                });
                rasters
            }
            Err(e) => {
                warn!("Rendering failed, continuing without crops: {}", e);
                render_degraded = true;
                notify(config, |cb| cb.on_stage_degraded(Stage::Render, &e.to_string()));
                Vec::new()
            }
        }
    } else {
        debug!("Cropping disabled, skipping rendering");
        Vec::new()
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 3: Walk the block tree ──────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(Stage::Walk));
    let walk_start = Instant::now();
    let cropper = config.crop_images.then(|| Cropper::new(&config.output_dir));
    let max_depth = config.max_depth;
    let (structure, crops, text_length, page_count) =
        tokio::task::spawn_blocking(move || walk_document(raw, rasters, cropper, max_depth))
            .await
            .map_err(|e| Layout2JsonError::Internal(format!("Walk task panicked: {}", e)))?;
    let walk_duration_ms = walk_start.elapsed().as_millis() as u64;
    notify(config, |cb| cb.on_stage_complete(Stage::Walk, walk_duration_ms));

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let document = DocumentResult {
        metadata: DocumentMetadata {
            filename: resolved.file_name(),
            page_count,
            text_length,
        },
        structure,
    };

    let crops_saved = crops.iter().filter(|c| c.is_saved()).count();
    let stats = ParseStats {
        page_count,
        node_count: document.nodes().count(),
        table_count: document.nodes().filter(|n| n.node_type.is_table()).count(),
        image_count: document.nodes().filter(|n| n.node_type.is_visual()).count(),
        crops_saved,
        crops_skipped: crops.len() - crops_saved,
        render_degraded,
        analysis_duration_ms,
        render_duration_ms,
        walk_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Parse complete: {} nodes ({} tables, {} images, {} crops), {}ms total",
        stats.node_count,
        stats.table_count,
        stats.image_count,
        stats.crops_saved,
        stats.total_duration_ms
    );

    Ok(ParseOutput {
        document,
        crops,
        stats,
        stem: resolved.stem(),
    })
}

/// Blocking part of the parse: the walk writes crops to disk.
fn walk_document(
    raw: RawLayoutResult,
    rasters: Vec<DynamicImage>,
    cropper: Option<Cropper>,
    max_depth: usize,
) -> (Vec<crate::model::OutputNode>, Vec<CropRecord>, usize, usize) {
    let text = FullText::new(raw.full_text());
    let mut walker = Walker::new(&text, &rasters).max_depth(max_depth);
    if let Some(ref cropper) = cropper {
        walker = walker.with_cropper(cropper);
    }
    let out = walker.walk(raw.root_blocks());
    (out.structure, out.crops, text.char_len(), raw.page_count())
}
