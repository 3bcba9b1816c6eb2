//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! Rendering is blocking and CPU-bound. The fetch loop already runs document
//! processing on tokio's blocking pool, so [`PageRenderer::render`] is a plain
//! synchronous call.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded; the printer scales the
//! page down to the paper width anyway.

use crate::config::WatcherConfig;
use crate::error::PrintDropError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a multi-page document into ordered page rasters.
pub trait PageRenderer: Send + Sync {
    /// Render every page of the document at `path`, in page order.
    fn render(&self, path: &Path) -> Result<Vec<DynamicImage>, PrintDropError>;
}

/// pdfium-backed renderer.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    lib_dir: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRenderer {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            lib_dir: config.pdfium_lib_path.clone(),
            max_pixels: config.max_rendered_pixels,
        }
    }

    fn bind(&self) -> Result<Pdfium, PrintDropError> {
        let bindings = match &self.lib_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PrintDropError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, PrintDropError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PrintDropError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PrintDropError::RasterisationFailed {
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
            results.push(image);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_directory_fails_to_bind() {
        let config = WatcherConfig::builder()
            .pdfium_lib_path("/nonexistent/pdfium")
            .build()
            .unwrap();
        let renderer = PdfiumRenderer::new(&config);

        let err = renderer.render(Path::new("/tmp/unused.pdf")).unwrap_err();
        assert!(matches!(err, PrintDropError::PdfiumBindingFailed(_)));
    }

    #[test]
    fn renderer_takes_limits_from_config() {
        let config = WatcherConfig::builder().max_rendered_pixels(1200).build().unwrap();
        let renderer = PdfiumRenderer::new(&config);
        assert_eq!(renderer.max_pixels, 1200);
        assert!(renderer.lib_dir.is_none());
    }
}
