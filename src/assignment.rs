//! Color classes, printer identities, and the class → printer assignment.
//!
//! The assignment is loaded once from an [`AssignmentStore`] at startup and
//! shared with the fetch loop through [`SharedAssignments`]. Reconfiguring
//! swaps in a whole new [`PrinterAssignment`]; readers hold an `Arc` snapshot
//! for the duration of one document, so a swap is never observed mid-document.

use crate::error::PrintDropError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Result of classifying one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorClass {
    /// Grayscale, or RGB with no chromatic information.
    BlackWhite,
    /// At least one pixel with differing channel values.
    Color,
    /// Undecodable raster or unsupported channel layout. Never dispatched.
    Unknown,
}

impl ColorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorClass::BlackWhite => "black_white",
            ColorClass::Color => "color",
            ColorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// USB vendor/product id pair identifying one attached printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vid: u16,
    pub pid: u16,
}

impl DeviceIdentity {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.vid, self.pid)
    }
}

impl FromStr for DeviceIdentity {
    type Err = String;

    /// Parse `VID:PID`. Each half is hex with a `0x` prefix, otherwise decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vid, pid) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected VID:PID, got '{s}'"))?;
        Ok(Self {
            vid: parse_id(vid)?,
            pid: parse_id(pid)?,
        })
    }
}

fn parse_id(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid USB id '{s}': {e}"))
}

/// Which printer handles which color class.
///
/// Serialised in the same shape the config file has always used:
/// `{"black_white": {"vid": 1046, "pid": 20497}, "color": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_white: Option<DeviceIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<DeviceIdentity>,
}

impl PrinterAssignment {
    /// Device bound to `class`. `Unknown` has no slot and is always `None`.
    pub fn get(&self, class: ColorClass) -> Option<DeviceIdentity> {
        match class {
            ColorClass::BlackWhite => self.black_white,
            ColorClass::Color => self.color,
            ColorClass::Unknown => None,
        }
    }

    /// True when no class has a printer; the watcher refuses to start.
    pub fn is_empty(&self) -> bool {
        self.black_white.is_none() && self.color.is_none()
    }
}

// ── Config store ─────────────────────────────────────────────────────────

/// Persistent home of the printer assignment.
pub trait AssignmentStore: Send + Sync {
    /// Load the stored assignment; an unconfigured store yields an empty one.
    fn load(&self) -> Result<PrinterAssignment, PrintDropError>;

    /// Replace the stored assignment.
    fn save(&self, assignment: &PrinterAssignment) -> Result<(), PrintDropError>;
}

/// JSON file store (`printer_config.json` by default).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AssignmentStore for JsonFileStore {
    fn load(&self) -> Result<PrinterAssignment, PrintDropError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No printer configuration at {}", self.path.display());
                return Ok(PrinterAssignment::default());
            }
            Err(source) => {
                return Err(PrintDropError::ConfigStoreRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&raw).map_err(|source| PrintDropError::ConfigStoreParse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, assignment: &PrinterAssignment) -> Result<(), PrintDropError> {
        let json = serde_json::to_vec_pretty(assignment).map_err(|e| {
            PrintDropError::Internal(format!("Failed to serialise printer assignment: {e}"))
        })?;

        let write_err = |source| PrintDropError::ConfigStoreWrite {
            path: self.path.clone(),
            source,
        };

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        info!("Saved printer configuration to {}", self.path.display());
        Ok(())
    }
}

// ── Shared runtime handle ────────────────────────────────────────────────

/// The live assignment, swapped atomically on reconfiguration.
///
/// Cloning shares the same underlying value.
#[derive(Clone)]
pub struct SharedAssignments {
    tx: Arc<watch::Sender<Arc<PrinterAssignment>>>,
}

impl SharedAssignments {
    pub fn new(initial: PrinterAssignment) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Current assignment. Hold the returned `Arc` for a whole document.
    pub fn snapshot(&self) -> Arc<PrinterAssignment> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replace the assignment wholesale; the next snapshot sees the new value.
    pub fn replace(&self, assignment: PrinterAssignment) {
        info!(
            black_white = ?assignment.black_white,
            color = ?assignment.color,
            "Printer assignment replaced"
        );
        self.tx.send_replace(Arc::new(assignment));
    }
}

impl fmt::Debug for SharedAssignments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedAssignments")
            .field(&*self.snapshot())
            .finish()
    }
}
