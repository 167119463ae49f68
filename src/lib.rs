//! # layout2json
//!
//! Turn a Document AI layout-analysis result into a hierarchical JSON tree.
//!
//! ## Why this crate?
//!
//! A layout parser returns a block tree whose text lives in one big string
//! addressed by character offsets, whose tables are rows of cells with spans,
//! and whose figures are just polygons on a page. This crate resolves all of
//! that into self-contained nodes: every heading and paragraph carries its
//! text, every table its grid, every figure a PNG crop cut from the rendered
//! page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Analyze  Document AI layout processor (or a saved result)
//!  ├─ 3. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Walk     blocks → nodes; text, bboxes, table grids, crops
//!  ├─ 5. Narrate  optional prose for tables and diagrams via an LLM
//!  └─ 6. Output   {metadata, structure} JSON + images/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layout2json::{parse_to_file, DocumentAiClient, ParseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // DOCAI_PROJECT_ID / DOCAI_PROCESSOR_ID / GOOGLE_APPLICATION_CREDENTIALS
//!     let analyzer = DocumentAiClient::from_env()?;
//!     let config = ParseConfig::builder().output_dir("out").build()?;
//!     let (path, output) = parse_to_file("document.pdf", &analyzer, &config).await?;
//!     eprintln!("{} nodes → {}", output.stats.node_count, path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `layout2json` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! layout2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tree;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AnalyzerConfig, NarrationConfig, NarrationConfigBuilder, ParseConfig, ParseConfigBuilder,
};
pub use error::{CropSkip, Layout2JsonError, NarrationError};
pub use model::{
    BoundingBox, DocumentMetadata, DocumentResult, NodeType, OutputNode, RawLayoutResult,
    TableCellData, TableData,
};
pub use parse::{
    parse, parse_from_bytes, parse_sync, parse_to_file, write_document, ParseOutput, ParseStats,
};
pub use pipeline::analyze::{DocumentAiClient, LayoutAnalyzer, ProcessorInfo, SavedAnalysis};
pub use pipeline::narrate::{
    narrate_document, LlmNarrator, NarrationContent, NarrationReport, Narrator, NarratorReply,
};
pub use progress::{NoopProgressCallback, ParseProgressCallback, ProgressCallback, Stage};
pub use tree::{CropOutcome, CropRecord, Cropper, FullText, TableKind, WalkOutput, Walker};
