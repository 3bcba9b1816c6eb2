//! Error types for the printdrop library.
//!
//! Failures are split by how far they reach:
//!
//! * [`PrintDropError`]: **fatal** for the operation that returned it.
//!   Either the watcher cannot start at all (no printers configured, bad
//!   configuration) or a single document cannot be processed (pdfium missing,
//!   corrupt PDF). The fetch loop logs the document-level ones and moves on.
//!
//! * [`FetchError`], [`AssignmentMiss`], [`DeviceError`]: **per-stage**
//!   failures that are recovered where they occur. A failed download skips one
//!   file, a miss skips one page, a device error marks one page failed.

use crate::assignment::{ColorClass, DeviceIdentity};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the watcher from starting or a document from being processed.
#[derive(Debug, Error)]
pub enum PrintDropError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// No printer is bound to any color class.
    #[error(
        "No printers are configured.\n\
Run: printdrop configure --black-white <VID:PID> --color <VID:PID>"
    )]
    ConfigMissing,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Config store errors ───────────────────────────────────────────────
    /// The printer configuration file exists but could not be read.
    #[error("Failed to read printer configuration '{path}': {source}")]
    ConfigStoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The printer configuration file is not valid JSON for an assignment.
    #[error("Printer configuration '{path}' is malformed: {source}")]
    ConfigStoreParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The printer configuration could not be written.
    #[error("Failed to write printer configuration '{path}': {source}")]
    ConfigStoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// The per-document temporary workspace could not be created or written.
    #[error("Document workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or pass --pdfium-lib-path <DIR>."
    )]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A listing or download request that did not yield usable data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body-read failure.
    #[error("request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("'{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The listing body was not a JSON array.
    #[error("listing from '{url}' is malformed: {reason}")]
    MalformedListing { url: String, reason: String },
}

/// No device is bound to the class of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no printer assigned for class '{class}'")]
pub struct AssignmentMiss {
    pub class: ColorClass,
}

/// The print device could not be opened or rejected the job.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No attached USB printer matches the identity.
    #[error("printer {device} is not attached")]
    NotFound { device: DeviceIdentity },

    /// Opening or writing the device node failed.
    #[error("I/O error on printer {device}: {source}")]
    Io {
        device: DeviceIdentity,
        #[source]
        source: std::io::Error,
    },

    /// The job was used after its cut, or the image had no printable area.
    #[error("printer {device} rejected the job: {detail}")]
    Rejected {
        device: DeviceIdentity,
        detail: String,
    },
}
