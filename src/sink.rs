use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::types::ProbeOutcome;

/// Default results file, relative to the working directory.
pub const RESULTS_FILE: &str = "scanip.results.txt";

/// Appends successful outcomes to the results file and echoes progress.
///
/// Only the aggregator task holds a sink, so appends never interleave.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    console: bool,
    recorded: u64,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            console: true,
            recorded: 0,
        }
    }

    /// Disable the console progress line.
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    /// Lines successfully appended so far.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Persist one successful outcome. A write failure is logged and dropped.
    pub fn record(&mut self, scanned: u64, total: u64, outcome: &ProbeOutcome) {
        match append_line(&self.path, &format_record(outcome)) {
            Ok(()) => self.recorded += 1,
            Err(e) => warn!("result for {} not saved: {e:#}", outcome.target),
        }
        if self.console {
            println!("{}", progress_line(scanned, total, outcome));
        }
    }
}

/// `address,port,title,{size}KB`. Commas inside titles are left as is.
pub fn format_record(outcome: &ProbeOutcome) -> String {
    format!(
        "{},{},{},{}KB",
        outcome.target.ip,
        outcome.target.port,
        outcome.title,
        outcome.size_kb()
    )
}

pub fn progress_line(scanned: u64, total: u64, outcome: &ProbeOutcome) -> String {
    format!(
        "{}/{} | {}:{} | {} | {}KB",
        scanned.to_string().green(),
        total.to_string().blue(),
        outcome.target.ip.to_string().green(),
        outcome.target.port.to_string().blue(),
        outcome.title.green(),
        outcome.size_kb()
    )
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
