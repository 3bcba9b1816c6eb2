//! Pipeline stages for fetching, classifying and printing documents.
//!
//! Each submodule implements exactly one step and reports its failures as
//! typed values; only the fetch loop decides what to log and skip.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ render ──▶ classify ──▶ route ──▶ dispatch
//! (HTTP)    (pdfium)   (pixels)     (config)  (ESC/POS)
//! ```
//!
//! 1. [`fetch`]: list the backend's files and download their bytes
//! 2. [`render`]: split PDFs into page rasters; other files are one page
//! 3. [`classify`]: decide `black_white` / `color` / `unknown` per page
//! 4. [`route`]: look up the printer bound to that class
//! 5. [`dispatch`]: print the page and cut; device failures stop here

pub mod classify;
pub mod dispatch;
pub mod fetch;
pub mod render;
pub mod route;
