use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Placeholder title used when a response carries no `<title>` tag.
pub const NO_TITLE: &str = "No Title";

/// One address:port pair to probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub ip: IpAddr,
    pub port: u16,
}

impl Target {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn url(&self) -> String {
        match self.ip {
            IpAddr::V4(v4) => format!("http://{}:{}/", v4, self.port),
            IpAddr::V6(v6) => format!("http://[{}]:{}/", v6, self.port),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Result of a single probe. Failures carry a reason and no title.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub target: Target,
    pub success: bool,
    pub title: String,
    pub size_bytes: usize,
    pub failure: Option<String>,
}

impl ProbeOutcome {
    pub fn responded(target: Target, title: String, size_bytes: usize) -> Self {
        Self {
            target,
            success: true,
            title,
            size_bytes,
            failure: None,
        }
    }

    pub fn failed(target: Target, reason: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            title: String::new(),
            size_bytes: 0,
            failure: Some(reason.into()),
        }
    }

    /// Whole kilobytes read, rounded down.
    pub fn size_kb(&self) -> usize {
        self.size_bytes / 1024
    }
}

/// Progress counters for one scan. Owned by the aggregator; never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSession {
    total: u64,
    scanned: u64,
}

impl ScanSession {
    pub fn new(total: u64) -> Self {
        Self { total, scanned: 0 }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Count one finished attempt. Returns `true` on the call that brings
    /// `scanned` up to `total`; never counts past `total`.
    pub fn record_attempt(&mut self) -> bool {
        if self.scanned >= self.total {
            return false;
        }
        self.scanned += 1;
        self.scanned == self.total
    }
}

/// End-of-scan report, optionally written as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: u64,
    pub scanned: u64,
    pub responded: u64,
    pub recorded: u64,
    pub cancelled: bool,
    pub started_at: String,
    pub finished_at: String,
}
