//! # printdrop
//!
//! Watch a file-drop endpoint and print whatever lands there, routing each
//! page to a black-and-white or a color receipt printer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! backend listing
//!  │
//!  ├─ 1. Fetch     GET the listing, download each file in order
//!  ├─ 2. Render    PDFs → page rasters via pdfium; other files are one page
//!  ├─ 3. Classify  black_white / color / unknown from the pixels
//!  ├─ 4. Route     class → USB printer from the current assignment
//!  └─ 5. Dispatch  ESC/POS raster + cut; failures stay on their page
//! ```
//!
//! The loop never stops on a bad file: transport failures skip the file,
//! undecodable pages classify as `unknown` and are not printed, missing
//! assignments and device errors are logged per page.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use printdrop::{
//!     AssignmentStore, Dispatcher, DocumentProcessor, FetchLoop, JsonFileStore,
//!     PdfiumRenderer, SharedAssignments, UsbLinePrinter, WatcherConfig,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WatcherConfig::default();
//!     let assignments = SharedAssignments::new(JsonFileStore::new(&config.config_path).load()?);
//!
//!     let processor = DocumentProcessor::new(
//!         Arc::new(PdfiumRenderer::new(&config)),
//!         Dispatcher::new(Arc::new(UsbLinePrinter::new(config.paper_width_dots))),
//!     );
//!     let cancel = CancellationToken::new();
//!     FetchLoop::new(&config, processor, assignments)?.run(cancel).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `printdrop` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assignment;
pub mod config;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assignment::{
    AssignmentStore, ColorClass, DeviceIdentity, JsonFileStore, PrinterAssignment,
    SharedAssignments,
};
pub use config::{WatcherConfig, WatcherConfigBuilder};
pub use device::{PrintDevice, PrintJob, UsbLinePrinter};
pub use error::{AssignmentMiss, DeviceError, FetchError, PrintDropError};
pub use pipeline::classify::{classify, classify_bytes};
pub use pipeline::dispatch::{DispatchOutcome, Dispatcher};
pub use pipeline::fetch::{BackendClient, FileContent, FileDescriptor};
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use pipeline::route::resolve;
pub use process::{DocumentOutcome, DocumentProcessor, PageOutcome};
pub use watch::{CycleReport, FetchLoop};
