//! Startup configuration for the watcher.
//!
//! Everything that stays fixed for the lifetime of the process lives in
//! [`WatcherConfig`], built via its [`WatcherConfigBuilder`]. The printer
//! assignment can change at runtime and lives in
//! [`crate::assignment::SharedAssignments`] instead.

use crate::error::PrintDropError;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the fetch loop, the renderer and the print device.
///
/// # Example
/// ```rust
/// use printdrop::WatcherConfig;
/// use std::time::Duration;
///
/// let config = WatcherConfig::builder()
///     .listing_url("http://printbox.local:5000/files")
///     .download_base_url("http://printbox.local:5000")
///     .poll_interval(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Endpoint returning the JSON array of uploaded files.
    /// Default: `http://localhost:5000/files`.
    pub listing_url: String,

    /// Prefix joined with each listing `path` to form the download URL.
    /// Default: `http://localhost:5000`.
    pub download_base_url: String,

    /// Sleep between the end of one cycle and the next listing request. Default: 5 s.
    pub poll_interval: Duration,

    /// Per-request timeout for listing and download calls. Default: 30.
    pub request_timeout_secs: u64,

    /// Location of the printer assignment file. Default: `printer_config.json`.
    pub config_path: PathBuf,

    /// Longest edge of a rendered PDF page in pixels. Default: 2000.
    ///
    /// Pages are scaled down again to the paper width before printing, so this
    /// only bounds memory during rendering and classification.
    pub max_rendered_pixels: u32,

    /// Printable width of the receipt paper in dots. Default: 576 (80 mm at 203 dpi).
    pub paper_width_dots: u32,

    /// Directory containing libpdfium. If `None`, the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Address uploaders should open; only logged at startup.
    pub upload_url: Option<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            listing_url: "http://localhost:5000/files".to_string(),
            download_base_url: "http://localhost:5000".to_string(),
            poll_interval: Duration::from_secs(5),
            request_timeout_secs: 30,
            config_path: PathBuf::from("printer_config.json"),
            max_rendered_pixels: 2000,
            paper_width_dots: 576,
            pdfium_lib_path: None,
            upload_url: None,
        }
    }
}

impl WatcherConfig {
    /// Create a new builder for `WatcherConfig`.
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder {
            config: Self::default(),
        }
    }

    /// Download URL for a server-relative listing path.
    pub fn download_url(&self, path: &str) -> String {
        format!("{}{}", self.download_base_url, path)
    }
}

/// Builder for [`WatcherConfig`].
#[derive(Debug)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    pub fn listing_url(mut self, url: impl Into<String>) -> Self {
        self.config.listing_url = url.into();
        self
    }

    pub fn download_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.download_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = path.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn paper_width_dots(mut self, dots: u32) -> Self {
        self.config.paper_width_dots = dots;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.upload_url = Some(url.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WatcherConfig, PrintDropError> {
        let c = &self.config;
        validate_http_url("listing URL", &c.listing_url)?;
        validate_http_url("download base URL", &c.download_base_url)?;
        if c.poll_interval < Duration::from_secs(1) {
            return Err(PrintDropError::InvalidConfig(format!(
                "Poll interval must be at least 1s, got {:?}",
                c.poll_interval
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(PrintDropError::InvalidConfig(
                "Request timeout must be ≥ 1s".into(),
            ));
        }
        // ESC/POS raster rows are whole bytes.
        if c.paper_width_dots < 8 || c.paper_width_dots % 8 != 0 {
            return Err(PrintDropError::InvalidConfig(format!(
                "Paper width must be a positive multiple of 8 dots, got {}",
                c.paper_width_dots
            )));
        }
        Ok(self.config)
    }
}

fn validate_http_url(what: &str, url: &str) -> Result<(), PrintDropError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| PrintDropError::InvalidConfig(format!("Invalid {what} '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PrintDropError::InvalidConfig(format!(
            "{what} must be http or https, got '{other}'"
        ))),
    }
}
