//! docslice: slice a document and stream it through the transfer protocol
//!
//! Commands:
//!   send <path>   - open the document, fetch every slice, print the report
//!   config show   - display the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use docslice_core::config::{DocsliceConfig, ReportOrder};
use docslice_core::units::fmt_bytes;
use docslice_core::{ChunkSize, FileKind};
use docslice_transfer::{
    MemoryHost, Notification, ProgressFn, RawDataView, Readiness, TransferOptions,
    TransferSession, TransferSummary, ViewerRegistry,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "docslice",
    version,
    about = "Slice a document and stream it chunk by chunk"
)]
struct Cli {
    /// Path to docslice.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "DOCSLICE_CONFIG",
        default_value = "/etc/docslice/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "DOCSLICE_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config file
    #[arg(long, env = "DOCSLICE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a document, fetch every slice, and print the transfer report
    Send {
        /// Document to send
        path: PathBuf,
        /// Chunk size in MB (default: from config)
        #[arg(long, short = 's')]
        chunk_size_mb: Option<f64>,
        /// Document kind requested from the host
        #[arg(long)]
        kind: Option<KindArg>,
        /// Order of slice entries in the report
        #[arg(long)]
        order: Option<OrderArg>,
        /// Write the reassembled document here
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Open the raw data view for this slice (1-based, as in the report)
        #[arg(long)]
        view: Option<u64>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current effective configuration
    Show,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum KindArg {
    Compressed,
    Text,
}

impl From<KindArg> for FileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Compressed => FileKind::Compressed,
            KindArg::Text => FileKind::Text,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum OrderArg {
    Arrival,
    Index,
}

impl From<OrderArg> for ReportOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Arrival => ReportOrder::Arrival,
            OrderArg::Index => ReportOrder::Index,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DocsliceConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.log_level);
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| configured_log_format(&config.logging.log_format));
    init_logging(level, &format);

    match cli.command {
        Commands::Send {
            path,
            chunk_size_mb,
            kind,
            order,
            out,
            view,
            json,
        } => {
            let args = SendArgs {
                path,
                chunk_size_mb,
                kind: kind.map(Into::into),
                order: order.map(Into::into),
                out,
                view,
                json,
            };
            cmd_send(&config, args).await
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn configured_log_format(value: &str) -> LogFormat {
    LogFormat::from_str(value, true).unwrap_or(LogFormat::Text)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `docslice send` ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct SendArgs {
    path: PathBuf,
    chunk_size_mb: Option<f64>,
    kind: Option<FileKind>,
    order: Option<ReportOrder>,
    out: Option<PathBuf>,
    view: Option<u64>,
    json: bool,
}

impl SendArgs {
    fn options(&self, config: &DocsliceConfig) -> Result<TransferOptions> {
        let chunk = match self.chunk_size_mb {
            Some(mb) => ChunkSize::from_megabytes(mb)?,
            None => config.transfer.chunk_size()?,
        };
        let mut options = TransferOptions::new(chunk);
        options.kind = self.kind.unwrap_or(config.transfer.file_kind);
        options.order = self.order.unwrap_or(config.transfer.report_order);
        options.reassemble = self.out.is_some();
        Ok(options)
    }
}

#[derive(Debug, Serialize)]
struct SendSummary<'a> {
    path: &'a Path,
    size_bytes: Option<u64>,
    slice_count: Option<u64>,
    received: &'a [u64],
    failed: Vec<FailedSlice<'a>>,
    completed: bool,
    released: bool,
    blake3: Option<String>,
    report: Vec<String>,
    notifications: &'a [Notification],
    view: Option<ViewSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct ViewSummary<'a> {
    /// 1-based, as in the report
    slice: u64,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct FailedSlice<'a> {
    index: u64,
    message: &'a str,
}

impl<'a> SendSummary<'a> {
    fn new(
        path: &'a Path,
        summary: &'a TransferSummary,
        view: Option<&'a RawDataView>,
    ) -> Self {
        Self {
            path,
            size_bytes: summary.info.map(|i| i.size_bytes),
            slice_count: summary.info.map(|i| i.slice_count),
            received: &summary.received,
            failed: summary
                .failed
                .iter()
                .map(|(index, message)| FailedSlice {
                    index: *index,
                    message,
                })
                .collect(),
            completed: summary.completed,
            released: summary.released,
            blake3: summary.reassembled.as_ref().map(|r| r.blake3_hex()),
            report: summary.report.lines(),
            notifications: summary.report.notifications(),
            view: view.map(|v| ViewSummary {
                slice: v.index + 1,
                title: v.title,
                content: &v.content,
            }),
        }
    }
}

async fn cmd_send(config: &DocsliceConfig, args: SendArgs) -> Result<()> {
    let options = args.options(config)?;

    // The host is initialized once the document is loaded into it.
    let host_ready = Readiness::new();
    let host = MemoryHost::load(&args.path)
        .await?
        .configured(&config.host);
    host_ready.mark_ready();
    info!(
        path = %args.path.display(),
        size = host.document().len(),
        chunk = options.chunk.bytes(),
        kind = %options.kind,
        "host initialized"
    );

    let pb = make_progress_bar(0, "send");
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |done, total, msg| {
        pb_clone.set_length(total);
        pb_clone.set_position(done);
        pb_clone.set_message(msg.to_string());
    });

    // A terminal renderer has nothing to load.
    let viewer = ViewerRegistry::new(Readiness::ready());
    let summary = TransferSession::new(host, host_ready, options)
        .with_progress(progress)
        .run(Some(&viewer))
        .await;
    pb.finish_and_clear();

    if let (Some(out), Some(doc)) = (&args.out, &summary.reassembled) {
        tokio::fs::write(out, &doc.data)
            .await
            .with_context(|| format!("writing reassembled document: {}", out.display()))?;
    }

    let view = match args.view {
        Some(number) => open_view(&viewer, number).await,
        None => None,
    };

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&SendSummary::new(&args.path, &summary, view.as_ref()))
                .context("serializing summary to JSON")?;
        println!("{rendered}");
    } else {
        print_report(&args, &summary);
        if let Some(view) = &view {
            print_view(view);
        }
    }

    if !summary.acquired() {
        anyhow::bail!("{}: document could not be opened", args.path.display());
    }
    if !summary.failed.is_empty() {
        anyhow::bail!(
            "{}: {} of {} slices failed",
            args.path.display(),
            summary.failed.len(),
            summary.info.map_or(0, |i| i.slice_count)
        );
    }
    Ok(())
}

fn print_report(args: &SendArgs, summary: &TransferSummary) {
    for line in summary.report.lines() {
        println!("{line}");
    }
    for notification in summary.report.notifications() {
        eprintln!("{notification}");
    }

    let Some(info) = summary.info else {
        return;
    };
    println!();
    println!("  document:  {}", args.path.display());
    println!("  size:      {}", fmt_bytes(info.size_bytes));
    println!("  slices:    {}/{} received", summary.received.len(), info.slice_count);
    println!("  released:  {}", if summary.released { "yes" } else { "no" });
    if let Some(doc) = &summary.reassembled {
        println!("  blake3:    {}", doc.blake3_hex());
    }
    if let Some(out) = &args.out {
        match &summary.reassembled {
            Some(_) => println!("  written:   {}", out.display()),
            None => println!("  written:   (skipped, document incomplete)"),
        }
    }
}

/// Open the view for report slice `number` (1-based).
async fn open_view(viewer: &ViewerRegistry, number: u64) -> Option<RawDataView> {
    let Some(index) = number.checked_sub(1) else {
        eprintln!("slice numbers start at 1");
        return None;
    };
    let view = viewer.view(index).await;
    if view.is_none() {
        eprintln!("slice {number} was not received");
    }
    view
}

fn print_view(view: &RawDataView) {
    println!();
    println!("── {} (slice {}) ──", view.title, view.index + 1);
    println!("{}", view.content);
}

// ── `docslice config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &DocsliceConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
