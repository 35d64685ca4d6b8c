use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::scanner::DEFAULT_CONCURRENCY;

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(280);

/// Conditions that stop the program before any probe is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No input provided. Exiting.")]
    NoInput,
    #[error("No valid IPs found. Exiting.")]
    NoValidTargets,
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Everything a scan run needs, after flags and prompts are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub ranges: String,
    pub concurrency: usize,
    pub port: u16,
    pub timeout: Duration,
    pub output: PathBuf,
    pub summary: Option<PathBuf>,
    pub deadline: Option<Duration>,
}

/// Line-oriented prompts over any reader/writer pair.
///
/// A value passed on the command line skips its prompt. End of input reads
/// as an empty answer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn ranges(&mut self, preset: Option<String>) -> Result<String, ConfigError> {
        let answer = match preset {
            Some(v) => v,
            None => self.ask("Enter CIDR(s) or IP range (comma-separated): ")?,
        };
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(ConfigError::NoInput);
        }
        Ok(answer)
    }

    pub fn threads(&mut self, preset: Option<String>) -> Result<usize, ConfigError> {
        let answer = match preset {
            Some(v) => v,
            None => self.ask(&format!(
                "Enter number of threads (default {DEFAULT_CONCURRENCY}): "
            ))?,
        };
        Ok(parse_threads(&answer))
    }

    pub fn port(&mut self, preset: Option<String>) -> Result<u16, ConfigError> {
        let answer = match preset {
            Some(v) => v,
            None => self.ask(&format!("Enter website port (default {DEFAULT_PORT}): "))?,
        };
        Ok(parse_port(&answer))
    }

    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Thread count from free text: blank or non-numeric gives the default,
/// zero or negative gives 1.
pub fn parse_threads(input: &str) -> usize {
    let input = input.trim();
    if input.is_empty() {
        return DEFAULT_CONCURRENCY;
    }
    match input.parse::<i64>() {
        Ok(n) if n <= 0 => {
            warn!("thread count {n} is not positive, using 1");
            1
        }
        Ok(n) => usize::try_from(n).unwrap_or(DEFAULT_CONCURRENCY),
        Err(_) => {
            warn!("thread count `{input}` is not a number, using {DEFAULT_CONCURRENCY}");
            DEFAULT_CONCURRENCY
        }
    }
}

/// Port from free text: blank, non-numeric, 0 or out of range gives the default.
pub fn parse_port(input: &str) -> u16 {
    let input = input.trim();
    if input.is_empty() {
        return DEFAULT_PORT;
    }
    match input.parse::<u16>() {
        Ok(p) if p != 0 => p,
        _ => {
            warn!("port `{input}` is invalid, using {DEFAULT_PORT}");
            DEFAULT_PORT
        }
    }
}
