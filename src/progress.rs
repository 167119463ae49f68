//! Progress-callback trait for parse and narration events.
//!
//! Inject an [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::config::ParseConfigBuilder::progress_callback`] (and pass the
//! same callback to [`crate::pipeline::narrate::narrate_document`]) to
//! follow a document through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use layout2json::{ParseConfig, ParseProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ParseProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{} done in {}ms", stage, elapsed_ms);
//!     }
//! }
//!
//! let config = ParseConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Analyze,
    Render,
    Walk,
    Narrate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Analyze => "layout analysis",
            Stage::Render => "page rendering",
            Stage::Walk => "block walk",
            Stage::Narrate => "narration",
            Stage::Write => "writing output",
        })
    }
}

/// Called by the pipeline as a document moves through its stages.
///
/// All methods default to no-ops. Node events may arrive concurrently from
/// the narration pass, so implementations must be `Send + Sync`.
pub trait ParseProgressCallback: Send + Sync {
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Rendering failed; the document continues without crops.
    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }

    /// A narrative was attached to node `node_id`.
    fn on_node_narrated(&self, node_id: &str, done: usize, total: usize) {
        let _ = (node_id, done, total);
    }

    /// A narrative could not be produced for node `node_id`.
    fn on_node_error(&self, node_id: &str, error: &str) {
        let _ = (node_id, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ParseProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ParseConfig`].
pub type ProgressCallback = Arc<dyn ParseProgressCallback>;
