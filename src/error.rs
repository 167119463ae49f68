//! Error types for the layout2json library.
//!
//! Three error types for three failure modes:
//!
//! * [`Layout2JsonError`]: **fatal**. The document cannot be processed at
//!   all (unreadable input, analyzer not configured, analysis call failed,
//!   output not writable). Returned as `Err` from the `parse*` functions.
//!
//! * [`CropSkip`]: **non-fatal**. One image region was not cropped. The
//!   node is still emitted, just without `filePath`, and the reason is
//!   reported in [`crate::tree::CropRecord`].
//!
//! * [`NarrationError`]: **non-fatal**. The language model could not
//!   describe one node. The node keeps everything except `narrative`.
//!
//! Missing or malformed fields in the analysis result are not errors at all;
//! they decode to "absent" in [`crate::model`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the layout2json library.
#[derive(Debug, Error)]
pub enum Layout2JsonError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// Project, processor or credentials are missing.
    #[error("Layout analyzer is not configured: {missing}\n{hint}")]
    AnalyzerNotConfigured { missing: String, hint: String },

    /// The analysis service answered with a non-success status.
    #[error("Layout analysis failed (HTTP {status}): {detail}")]
    AnalysisFailed { status: u16, detail: String },

    /// The analysis request could not be sent or its answer not read.
    #[error("Layout analysis request failed: {0}")]
    AnalysisTransport(String),

    /// The analysis call exceeded the configured timeout.
    #[error("Layout analysis timed out after {secs}s")]
    AnalysisTimeout { secs: u64 },

    /// The analysis result is not a JSON object we can read.
    #[error("Invalid layout analysis result: {0}")]
    InvalidAnalysis(String),

    // ── Narration errors ──────────────────────────────────────────────────
    /// The language-model provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    NarratorNotConfigured { provider: String, hint: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not be loaded or returned an error for a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an image region produced no crop.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CropSkip {
    #[error("block has no bounding polygon")]
    NoBoundingPoly,

    #[error("no page rasters are available")]
    NoRasters,

    #[error("page {page} is outside the {available} rendered pages")]
    PageOutOfRange { page: u32, available: usize },

    #[error("bounding polygon has no vertices")]
    NoVertices,

    #[error("crop region is empty")]
    Degenerate,

    #[error("failed to write crop: {detail}")]
    WriteFailed { detail: String },
}

/// A narrative that could not be produced for one node.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum NarrationError {
    /// The model call failed after retries.
    #[error("Node '{node_id}': model call failed after {retries} retries: {detail}")]
    LlmFailed {
        node_id: String,
        retries: u32,
        detail: String,
    },

    /// The model call timed out.
    #[error("Node '{node_id}': model call timed out after {secs}s")]
    Timeout { node_id: String, secs: u64 },

    /// The crop file of a visual node could not be read back.
    #[error("Node '{node_id}': cannot read crop '{path}': {detail}")]
    CropUnreadable {
        node_id: String,
        path: PathBuf,
        detail: String,
    },
}

impl NarrationError {
    pub fn node_id(&self) -> &str {
        match self {
            NarrationError::LlmFailed { node_id, .. }
            | NarrationError::Timeout { node_id, .. }
            | NarrationError::CropUnreadable { node_id, .. } => node_id,
        }
    }
}
