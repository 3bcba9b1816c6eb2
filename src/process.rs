//! Document processing: pages in, print decisions out.
//!
//! A downloaded file becomes one or more page rasters. PDFs go through the
//! [`PageRenderer`]; anything else is decoded as a single image. Each page is
//! then classified, routed and (if a printer is bound) dispatched, strictly in
//! page order. A failing page never stops its siblings.
//!
//! ```text
//! FileContent ─┬─ pdf ──▶ workspace file ──▶ renderer ──▶ pages ─┐
//!              └─ other ─▶ decode in memory ─────────────▶ page ──┤
//!                                                                 ▼
//!                        for each page: classify ─▶ resolve ─▶ dispatch
//! ```

use crate::assignment::{ColorClass, PrinterAssignment};
use crate::error::PrintDropError;
use crate::pipeline::classify;
use crate::pipeline::dispatch::{DispatchOutcome, Dispatcher};
use crate::pipeline::fetch::FileContent;
use crate::pipeline::render::PageRenderer;
use crate::pipeline::route;
use image::{DynamicImage, ImageResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Result for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    /// 0-based index in renderer order.
    pub index: usize,
    pub class: ColorClass,
    pub outcome: DispatchOutcome,
}

/// Result for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    pub source: String,
    pub pages: Vec<PageOutcome>,
}

impl DocumentOutcome {
    /// True iff at least one page was printed. Informational only.
    pub fn printed(&self) -> bool {
        self.pages
            .iter()
            .any(|p| p.outcome == DispatchOutcome::Printed)
    }

    pub fn count(&self, outcome: DispatchOutcome) -> usize {
        self.pages.iter().filter(|p| p.outcome == outcome).count()
    }
}

/// Scratch directory holding the source file while the renderer reads it.
///
/// Removed when dropped, on every exit path.
pub struct DocumentWorkspace {
    path: PathBuf,
    _dir: TempDir,
}

impl DocumentWorkspace {
    /// Write `content` into a fresh temporary directory.
    pub fn create(content: &FileContent) -> Result<Self, PrintDropError> {
        let dir = tempfile::Builder::new()
            .prefix("printdrop-")
            .tempdir()
            .map_err(PrintDropError::Workspace)?;
        let path = dir.path().join(format!("original.{}", content.extension));
        std::fs::write(&path, &content.bytes).map_err(PrintDropError::Workspace)?;
        debug!("Workspace for {} at {}", content.source, path.display());
        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Classifies, routes and dispatches every page of a document.
#[derive(Clone)]
pub struct DocumentProcessor {
    renderer: Arc<dyn PageRenderer>,
    dispatcher: Dispatcher,
}

impl DocumentProcessor {
    pub fn new(renderer: Arc<dyn PageRenderer>, dispatcher: Dispatcher) -> Self {
        Self {
            renderer,
            dispatcher,
        }
    }

    /// Process one downloaded file against a fixed assignment snapshot.
    ///
    /// # Errors
    /// Only when the document cannot be split into pages at all (workspace
    /// I/O, pdfium missing, corrupt PDF). Per-page problems are recorded in
    /// the returned [`DocumentOutcome`].
    pub fn process(
        &self,
        content: FileContent,
        assignments: &PrinterAssignment,
    ) -> Result<DocumentOutcome, PrintDropError> {
        info!(
            "Processing {} ({}, {} bytes)",
            content.source,
            content.extension,
            content.bytes.len()
        );

        let rasters = self.pages(&content)?;
        let mut pages = Vec::with_capacity(rasters.len());
        for (index, raster) in rasters.into_iter().enumerate() {
            pages.push(self.process_page(index, raster, assignments));
        }

        let outcome = DocumentOutcome {
            source: content.source,
            pages,
        };
        info!(
            "{}: {} printed, {} unassigned, {} failed",
            outcome.source,
            outcome.count(DispatchOutcome::Printed),
            outcome.count(DispatchOutcome::NoAssignment),
            outcome.count(DispatchOutcome::DeviceError)
        );
        Ok(outcome)
    }

    /// Per-page color classes without routing or printing.
    pub fn classify_document(
        &self,
        content: &FileContent,
    ) -> Result<Vec<ColorClass>, PrintDropError> {
        Ok(self
            .pages(content)?
            .iter()
            .map(|raster| match raster {
                Ok(img) => classify::classify(img),
                Err(_) => ColorClass::Unknown,
            })
            .collect())
    }

    /// Split `content` into page rasters in document order.
    fn pages(
        &self,
        content: &FileContent,
    ) -> Result<Vec<ImageResult<DynamicImage>>, PrintDropError> {
        if content.is_multi_page() {
            let workspace = DocumentWorkspace::create(content)?;
            let rendered = self.renderer.render(workspace.path())?;
            Ok(rendered.into_iter().map(Ok).collect())
        } else {
            Ok(vec![classify::decode(&content.bytes)])
        }
    }

    fn process_page(
        &self,
        index: usize,
        raster: ImageResult<DynamicImage>,
        assignments: &PrinterAssignment,
    ) -> PageOutcome {
        let class = match &raster {
            Ok(img) => classify::classify(img),
            Err(e) => {
                debug!("Page {}: not a decodable image: {}", index + 1, e);
                ColorClass::Unknown
            }
        };

        let device = match route::resolve(class, assignments) {
            Ok(device) => device,
            Err(miss) => {
                warn!("Page {}: {}", index + 1, miss);
                return PageOutcome {
                    index,
                    class,
                    outcome: DispatchOutcome::NoAssignment,
                };
            }
        };

        // An undecodable raster is `Unknown`, which never resolves.
        let Ok(image) = raster else {
            return PageOutcome {
                index,
                class,
                outcome: DispatchOutcome::NoAssignment,
            };
        };

        debug!("Page {}: {} → {}", index + 1, class, device);
        PageOutcome {
            index,
            class,
            outcome: self.dispatcher.dispatch(&image, &device),
        }
    }
}
