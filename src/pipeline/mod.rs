//! Pipeline stages around the block-tree walk.
//!
//! Each submodule implements one step that talks to the outside world
//! (files, HTTP, pdfium, a language model). The pure tree work lives in
//! [`crate::tree`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ analyze ──▶ render ──▶ (tree::walk) ──▶ narrate
//! (URL/path) (Document AI) (pdfium)   (crops, JSON)    (LLM, optional)
//! ```
//!
//! 1. [`input`]   canonicalise the user-supplied path or URL to a local file
//! 2. [`analyze`] obtain the layout-analysis result; the only fatal network step
//! 3. [`render`]  rasterise every page for cropping; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 4. [`narrate`] optional prose for tables and diagrams, with [`encode`]
//!    preparing crops for vision requests and [`postprocess`] cleaning the
//!    answers

pub mod analyze;
pub mod encode;
pub mod input;
pub mod narrate;
pub mod postprocess;
pub mod render;
