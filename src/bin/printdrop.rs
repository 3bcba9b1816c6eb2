//! CLI binary for printdrop.
//!
//! A thin shim over the library crate: maps flags to `WatcherConfig`, owns
//! the printer configuration file, and turns signals into reloads and
//! shutdown.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use printdrop::{
    AssignmentStore, DeviceIdentity, Dispatcher, DocumentProcessor, FetchLoop, FileContent,
    JsonFileStore, PdfiumRenderer, PrinterAssignment, SharedAssignments, UsbLinePrinter,
    WatcherConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bind printers (USB vendor:product ids, hex with 0x or decimal)
  printdrop configure --black-white 0x0416:0x5011 --color 0x04b8:0x0202

  # Watch the upload backend on another host
  printdrop watch --listing-url http://10.0.0.5:5000/files \
                  --download-base-url http://10.0.0.5:5000

  # Swap printers while watching: edit the config, then
  printdrop configure --color 0x04b8:0x0e28 && kill -HUP <pid>

  # Check how a file would be routed, without printing
  printdrop classify scan.pdf

ENVIRONMENT VARIABLES:
  PRINTDROP_CONFIG         Printer configuration file
  PRINTDROP_LISTING_URL    Backend listing endpoint
  PRINTDROP_DOWNLOAD_URL   Prefix for listing paths
  PDFIUM_LIB_PATH          Directory containing libpdfium
  RUST_LOG                 Overrides -v / -q log filtering
"#;

/// Print uploaded documents, routing each page to a monochrome or color printer.
#[derive(Parser, Debug)]
#[command(
    name = "printdrop",
    version,
    about = "Print uploaded documents, routing each page to a monochrome or color printer",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Printer configuration file.
    #[arg(long, global = true, env = "PRINTDROP_CONFIG", default_value = "printer_config.json")]
    config: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PRINTDROP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PRINTDROP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the backend and print every file it lists.
    Watch(WatchArgs),
    /// Bind printers to the black & white and color classes.
    Configure(ConfigureArgs),
    /// Show the current printer assignment as JSON.
    ShowConfig,
    /// Show the color class of each page of a local file, without printing.
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Backend endpoint returning the JSON file listing.
    #[arg(long, env = "PRINTDROP_LISTING_URL", default_value = "http://localhost:5000/files")]
    listing_url: String,

    /// Prefix joined with each listing path to download the file.
    #[arg(long, env = "PRINTDROP_DOWNLOAD_URL", default_value = "http://localhost:5000")]
    download_base_url: String,

    /// Seconds to sleep between polls.
    #[arg(long, env = "PRINTDROP_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "PRINTDROP_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Printable paper width in dots (576 for 80 mm, 384 for 58 mm).
    #[arg(long, env = "PRINTDROP_PAPER_WIDTH", default_value_t = 576)]
    paper_width: u32,

    #[command(flatten)]
    render: RenderArgs,

    /// Address uploaders should open; logged at startup.
    #[arg(long, env = "PRINTDROP_UPLOAD_URL")]
    upload_url: Option<String>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Directory containing libpdfium; defaults to the system library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Longest edge of a rendered PDF page in pixels.
    #[arg(long, env = "PRINTDROP_MAX_PIXELS", default_value_t = 2000)]
    max_rendered_pixels: u32,
}

#[derive(Args, Debug)]
struct ConfigureArgs {
    /// Printer for black & white pages, as VID:PID.
    #[arg(long, value_name = "VID:PID")]
    black_white: Option<DeviceIdentity>,

    /// Printer for color pages, as VID:PID.
    #[arg(long, value_name = "VID:PID")]
    color: Option<DeviceIdentity>,

    /// Remove the black & white binding.
    #[arg(long, conflicts_with = "black_white")]
    clear_black_white: bool,

    /// Remove the color binding.
    #[arg(long, conflicts_with = "color")]
    clear_color: bool,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Local PDF or image file.
    file: PathBuf,

    /// Output JSON instead of one line per page.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    render: RenderArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = JsonFileStore::new(&cli.config);

    match cli.command {
        Command::Watch(args) => watch(&cli.config, store, args).await,
        Command::Configure(args) => configure(&store, args),
        Command::ShowConfig => {
            let assignment = store
                .load()
                .context("Failed to load printer configuration")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&assignment).context("Failed to serialise assignment")?
            );
            Ok(())
        }
        Command::Classify(args) => classify(args).await,
    }
}

async fn watch(config_path: &Path, store: JsonFileStore, args: WatchArgs) -> Result<()> {
    let mut builder = WatcherConfig::builder()
        .listing_url(args.listing_url)
        .download_base_url(args.download_base_url)
        .poll_interval(Duration::from_secs(args.poll_interval))
        .request_timeout_secs(args.timeout)
        .config_path(config_path)
        .paper_width_dots(args.paper_width)
        .max_rendered_pixels(args.render.max_rendered_pixels);
    if let Some(dir) = args.render.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(url) = args.upload_url {
        builder = builder.upload_url(url);
    }
    let config = builder.build().context("Invalid configuration")?;

    let assignments = SharedAssignments::new(
        store
            .load()
            .context("Failed to load printer configuration")?,
    );

    let processor = DocumentProcessor::new(
        Arc::new(PdfiumRenderer::new(&config)),
        Dispatcher::new(Arc::new(UsbLinePrinter::new(config.paper_width_dots))),
    );

    let cancel = CancellationToken::new();
    let handle = FetchLoop::new(&config, processor, assignments.clone())?
        .spawn(cancel.clone())
        .context("Cannot start watching")?;

    if let Some(ref url) = config.upload_url {
        info!("Upload files at {}", url);
    }

    wait_for_shutdown(&store, &assignments).await?;

    info!("Shutting down");
    cancel.cancel();
    handle.await.context("Fetch loop task failed")?;
    Ok(())
}

/// Block until Ctrl-C or SIGTERM; SIGHUP reloads the printer configuration.
#[cfg(unix)]
async fn wait_for_shutdown(store: &JsonFileStore, assignments: &SharedAssignments) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            _ = terminate.recv() => return Ok(()),
            _ = hangup.recv() => reload(store, assignments),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_store: &JsonFileStore, _assignments: &SharedAssignments) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}

fn reload(store: &JsonFileStore, assignments: &SharedAssignments) {
    match store.load() {
        Ok(assignment) if assignment.is_empty() => {
            warn!(
                "Ignoring reload: {} has no printers",
                store.path().display()
            );
        }
        Ok(assignment) => assignments.replace(assignment),
        Err(e) => error!("Reload failed, keeping current printers: {}", e),
    }
}

fn configure(store: &JsonFileStore, args: ConfigureArgs) -> Result<()> {
    let mut assignment: PrinterAssignment = store
        .load()
        .context("Failed to load printer configuration")?;

    if let Some(device) = args.black_white {
        assignment.black_white = Some(device);
    }
    if let Some(device) = args.color {
        assignment.color = Some(device);
    }
    if args.clear_black_white {
        assignment.black_white = None;
    }
    if args.clear_color {
        assignment.color = None;
    }

    if assignment.is_empty() {
        anyhow::bail!("At least one printer must be configured (--black-white or --color)");
    }

    store
        .save(&assignment)
        .context("Failed to save printer configuration")?;

    println!("Black & white: {}", describe(assignment.black_white));
    println!("Color:         {}", describe(assignment.color));
    Ok(())
}

fn describe(device: Option<DeviceIdentity>) -> String {
    device
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(none)".to_string())
}

async fn classify(args: ClassifyArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let content = FileContent::new(args.file.to_string_lossy(), bytes);

    let mut builder =
        WatcherConfig::builder().max_rendered_pixels(args.render.max_rendered_pixels);
    if let Some(dir) = args.render.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    let config = builder.build().context("Invalid configuration")?;

    let processor = DocumentProcessor::new(
        Arc::new(PdfiumRenderer::new(&config)),
        Dispatcher::new(Arc::new(UsbLinePrinter::new(config.paper_width_dots))),
    );
    let classes = tokio::task::spawn_blocking(move || processor.classify_document(&content))
        .await
        .context("Classification task panicked")?
        .context("Failed to classify document")?;

    if args.json {
        let pages: Vec<_> = classes
            .iter()
            .enumerate()
            .map(|(i, class)| serde_json::json!({ "page": i + 1, "class": class }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&pages).context("Failed to serialise classes")?
        );
    } else {
        for (i, class) in classes.iter().enumerate() {
            println!("page {:>3}: {}", i + 1, class);
        }
    }
    Ok(())
}
