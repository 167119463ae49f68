//! PDF rasterisation: every page → `DynamicImage` via pdfium.
//!
//! The rasters are only used to cut image crops, so index `i` of the result
//! is page `i + 1` of the document and no page is skipped.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` keeps that work off
//! the async worker threads.
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` may name the pdfium shared library (or the directory
//! holding it); otherwise the system library is used. A failed bind is a
//! render failure like any other and only disables cropping.

use crate::config::ParseConfig;
use crate::error::Layout2JsonError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the pdfium library to load.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Rasterise every page of a PDF, in page order.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ParseConfig,
) -> Result<Vec<DynamicImage>, Layout2JsonError> {
    let path = pdf_path.to_path_buf();
    let scale = config.render_scale();
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, scale, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| Layout2JsonError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, Layout2JsonError> {
    let bindings = match std::env::var(ENV_PDFIUM_LIB_PATH) {
        Ok(p) if !p.is_empty() => {
            let mut path = PathBuf::from(p);
            if path.is_dir() {
                path = Pdfium::pdfium_platform_library_name_at_path(&path);
            }
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Layout2JsonError::RasterisationFailed {
        page: 0,
        detail: format!("cannot load pdfium: {e:?}"),
    })?;
    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    pdf_path: &Path,
    scale: f32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, Layout2JsonError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let cap = i32::try_from(max_pixels).unwrap_or(i32::MAX);
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(cap)
        .set_maximum_height(cap);

    let mut rasters = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Layout2JsonError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        rasters.push(image);
    }

    Ok(rasters)
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> Layout2JsonError {
    let detail = format!("{:?}", e);
    let path = pdf_path.to_path_buf();
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            Layout2JsonError::WrongPassword { path }
        } else {
            Layout2JsonError::PasswordRequired { path }
        }
    } else {
        Layout2JsonError::CorruptPdf { path, detail }
    }
}
