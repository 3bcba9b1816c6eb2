//! Backend access: fetch the file listing and download file contents.
//!
//! The backend is the only source of truth for what is waiting to be printed.
//! Nothing here remembers which files were already seen.

use crate::config::WatcherConfig;
use crate::error::{FetchError, PrintDropError};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extension tag used when the listing path has none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// One entry of the backend listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Server-relative path, e.g. `/uploads/1700000000-scan.pdf`.
    pub path: String,
}

/// A downloaded file, owned by the call that processes it.
#[derive(Debug, Clone)]
pub struct FileContent {
    /// Listing path the bytes came from.
    pub source: String,
    pub bytes: Vec<u8>,
    /// Lower-cased extension without the dot, [`DEFAULT_EXTENSION`] if absent.
    pub extension: String,
}

impl FileContent {
    /// Wrap bytes, deriving the extension tag from `source`.
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        let source = source.into();
        let extension = extension_of(&source);
        Self {
            source,
            bytes,
            extension,
        }
    }

    /// Whether the renderer must split this file into pages.
    pub fn is_multi_page(&self) -> bool {
        self.extension == "pdf"
    }
}

/// Lower-cased extension of `path`, or [`DEFAULT_EXTENSION`].
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// HTTP client for the listing and download endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    config: WatcherConfig,
}

impl BackendClient {
    pub fn new(config: &WatcherConfig) -> Result<Self, PrintDropError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PrintDropError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Request the current listing.
    ///
    /// Elements without a string `path` are skipped; a body that is not a
    /// JSON array is an error.
    pub async fn list_files(&self) -> Result<Vec<FileDescriptor>, FetchError> {
        let url = self.config.listing_url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedListing {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let Value::Array(entries) = body else {
            return Err(FetchError::MalformedListing {
                url: url.to_string(),
                reason: "expected a JSON array".into(),
            });
        };

        let total = entries.len();
        let files: Vec<FileDescriptor> = entries
            .into_iter()
            .filter_map(|entry| match entry.get("path").and_then(Value::as_str) {
                Some(path) if !path.is_empty() => Some(FileDescriptor {
                    path: path.to_string(),
                }),
                _ => {
                    warn!("Skipping listing entry without a path: {}", entry);
                    None
                }
            })
            .collect();

        debug!("Listing: {} entries, {} usable", total, files.len());
        Ok(files)
    }

    /// Download one listed file.
    pub async fn download(&self, file: &FileDescriptor) -> Result<FileContent, FetchError> {
        let url = self.config.download_url(&file.path);
        info!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport(&url, e))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(FileContent::new(file.path.clone(), bytes.to_vec()))
    }
}

fn transport(url: &str, e: reqwest::Error) -> FetchError {
    let reason = if e.is_timeout() {
        "timed out".to_string()
    } else {
        e.to_string()
    };
    FetchError::Transport {
        url: url.to_string(),
        reason,
    }
}
