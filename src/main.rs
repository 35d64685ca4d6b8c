use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scanip::config::{ConfigError, Prompter, ScanConfig, DEFAULT_TIMEOUT};
use scanip::probe::HttpProber;
use scanip::sink::{ResultSink, RESULTS_FILE};
use scanip::types::ScanSummary;
use scanip::{logging, scanner, targets};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// scanip — concurrent HTTP title scanner for IPv4 ranges.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scanip",
    version,
    about = "Concurrent HTTP title scanner for IPv4 ranges.",
    long_about = None,
    after_help = "Example:\n  scanip\n  (Prompts for CIDR, threads, and port)"
)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Comma-separated CIDRs or IP ranges. Prompted for when omitted.
    #[arg(long)]
    targets: Option<String>,

    /// Max probes in flight (default 500). Prompted for when omitted.
    #[arg(long, allow_hyphen_values = true)]
    threads: Option<String>,

    /// Website port (default 80). Prompted for when omitted.
    #[arg(long)]
    port: Option<String>,

    /// Per-probe timeout in milliseconds, body read included.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// File that successful results are appended to.
    #[arg(long, default_value = RESULTS_FILE)]
    output: PathBuf,

    /// Write a JSON summary of the scan to this path (optional).
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Stop dispatching new probes after this many seconds (optional).
    #[arg(long = "deadline-secs")]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());

    let ranges = match prompter.ranges(cli.targets.clone()) {
        Ok(r) => r,
        Err(ConfigError::NoInput) => return exit_early(ConfigError::NoInput),
        Err(e) => return Err(e.into()),
    };

    let ips = targets::expand_ranges(&ranges);
    if ips.is_empty() {
        return exit_early(ConfigError::NoValidTargets);
    }

    let concurrency = prompter.threads(cli.threads.clone())?;
    let port = prompter.port(cli.port.clone())?;
    drop(prompter);

    let config = ScanConfig {
        ranges,
        concurrency,
        port,
        timeout: Duration::from_millis(cli.timeout_ms),
        output: cli.output,
        summary: cli.summary,
        deadline: cli.deadline_secs.map(Duration::from_secs),
    };

    let summary = run(&config, &ips).await?;

    if let Some(path) = config.summary.as_deref() {
        if let Err(e) = write_summary_json(path, &summary) {
            eprintln!("Failed to write JSON to {}: {e:#}", path.display());
        } else {
            info!("wrote summary to {}", path.display());
        }
    }

    println!("Scan completed.");
    Ok(())
}

async fn run(config: &ScanConfig, ips: &[IpAddr]) -> Result<ScanSummary> {
    info!(ranges = %config.ranges, port = config.port, "expanded {} addresses", ips.len());
    let targets = targets::into_targets(ips, config.port);
    let prober = Arc::new(HttpProber::new(config.timeout).context("failed to build HTTP client")?);
    let sink = ResultSink::new(&config.output);

    let cancel = CancellationToken::new();

    // Ctrl-C stops dispatch; in-flight probes still finish.
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight probes");
            cancel_ctrlc.cancel();
        }
    });

    if let Some(deadline) = config.deadline {
        let cancel_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("scan deadline of {}s reached", deadline.as_secs());
            cancel_deadline.cancel();
        });
    }

    let summary =
        scanner::scan_targets_with_cancel(&targets, config.concurrency, prober, sink, cancel)
            .await?;
    info!(
        scanned = summary.scanned,
        total = summary.total,
        responded = summary.responded,
        recorded = summary.recorded,
        "scan finished"
    );
    Ok(summary)
}

fn exit_early(reason: ConfigError) -> Result<()> {
    println!("{reason}");
    Ok(())
}

fn write_summary_json(path: &std::path::Path, summary: &ScanSummary) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
