//! The fetch loop: poll, drain, sleep, repeat.
//!
//! ```text
//!          ┌──────────────────────────────────────────────┐
//!          ▼                                              │
//!   Poll (GET listing) ──▶ Drain (download + process ──▶ sleep
//!          │                each file in order)           ▲
//!          └── listing failed: log, treat as empty ───────┘
//! ```
//!
//! A cycle is the isolation boundary: every failure inside it is logged and
//! the loop carries on, and nothing that happens in one cycle affects the
//! next. Files are handled one at a time because the printers are
//! single-owner devices with no buffering.
//!
//! Every suspension point (listing request, download, sleep) races the
//! [`CancellationToken`], so shutdown takes effect without waiting out a
//! poll interval. A document that is already being printed finishes first.

use crate::assignment::SharedAssignments;
use crate::config::WatcherConfig;
use crate::error::PrintDropError;
use crate::pipeline::fetch::BackendClient;
use crate::process::{DocumentOutcome, DocumentProcessor};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one poll cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// The listing request failed and the cycle ran with no files.
    pub listing_failed: bool,
    /// Usable entries in the listing.
    pub listed: usize,
    pub downloaded: usize,
    pub failed_downloads: usize,
    /// Documents that could not be split into pages.
    pub failed_documents: usize,
    /// Outcomes of documents that were processed, in listing order.
    pub documents: Vec<DocumentOutcome>,
}

impl CycleReport {
    pub fn printed_documents(&self) -> usize {
        self.documents.iter().filter(|d| d.printed()).count()
    }
}

/// Background poller that feeds downloaded files to the [`DocumentProcessor`].
pub struct FetchLoop {
    client: BackendClient,
    processor: DocumentProcessor,
    assignments: SharedAssignments,
    poll_interval: Duration,
}

impl FetchLoop {
    pub fn new(
        config: &WatcherConfig,
        processor: DocumentProcessor,
        assignments: SharedAssignments,
    ) -> Result<Self, PrintDropError> {
        Ok(Self {
            client: BackendClient::new(config)?,
            processor,
            assignments,
            poll_interval: config.poll_interval,
        })
    }

    /// Run on a background task until `cancel` fires.
    ///
    /// # Errors
    /// [`PrintDropError::ConfigMissing`] when no printer is assigned; the
    /// task is not started in that case.
    pub fn spawn(self, cancel: CancellationToken) -> Result<JoinHandle<()>, PrintDropError> {
        self.ensure_configured()?;
        Ok(tokio::spawn(async move { self.run_loop(&cancel).await }))
    }

    /// Run on the current task until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PrintDropError> {
        self.ensure_configured()?;
        self.run_loop(&cancel).await;
        Ok(())
    }

    fn ensure_configured(&self) -> Result<(), PrintDropError> {
        if self.assignments.snapshot().is_empty() {
            return Err(PrintDropError::ConfigMissing);
        }
        Ok(())
    }

    async fn run_loop(&self, cancel: &CancellationToken) {
        info!("Watching for files every {:?}", self.poll_interval);

        loop {
            let report = self.run_cycle(cancel).await;
            if report.listed > 0 {
                info!(
                    "Cycle done: {} listed, {} downloaded, {} printed, \
                     {} download failures, {} document failures",
                    report.listed,
                    report.downloaded,
                    report.printed_documents(),
                    report.failed_downloads,
                    report.failed_documents
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Fetch loop stopped");
    }

    /// One Poll + Drain pass.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();

        let listing = tokio::select! {
            biased;
            _ = cancel.cancelled() => return report,
            listing = self.client.list_files() => listing,
        };

        let files = match listing {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to fetch files from backend: {}", e);
                report.listing_failed = true;
                Vec::new()
            }
        };
        report.listed = files.len();
        debug!("Poll returned {} files", files.len());

        for file in files {
            let download = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                download = self.client.download(&file) => download,
            };

            let content = match download {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: {}", file.path, e);
                    report.failed_downloads += 1;
                    continue;
                }
            };
            report.downloaded += 1;

            // One snapshot per document: a reconfiguration lands between documents.
            let assignments = self.assignments.snapshot();
            let processor = self.processor.clone();
            let result =
                tokio::task::spawn_blocking(move || processor.process(content, &assignments)).await;

            match result {
                Ok(Ok(outcome)) => {
                    if !outcome.printed() {
                        info!("{}: no page was printed", outcome.source);
                    }
                    report.documents.push(outcome);
                }
                Ok(Err(e)) => {
                    error!("Failed to process {}: {}", file.path, e);
                    report.failed_documents += 1;
                }
                Err(e) => {
                    error!("Processing task for {} panicked: {}", file.path, e);
                    report.failed_documents += 1;
                }
            }
        }

        report
    }
}
