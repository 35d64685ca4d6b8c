use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::USER_AGENT;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::{ProbeOutcome, Target, NO_TITLE};

/// Upper bound on response bytes read per probe.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Firefox/89.0",
];

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("title regex is valid"));

static LINE_BREAKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n]+").expect("line break regex is valid"));

/// Why a probe did not produce a result.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("body read failed: {0}")]
    Read(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl ProbeError {
    fn from_reqwest(err: reqwest::Error, reading_body: bool) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connect(err.to_string())
        } else if reading_body || err.is_body() || err.is_decode() {
            ProbeError::Read(err.to_string())
        } else {
            ProbeError::Request(err.to_string())
        }
    }
}

/// Something that can turn a target into an outcome.
///
/// Implementations must not panic on network errors; every failure is
/// reported through the returned outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: Target) -> ProbeOutcome;
}

/// Plain-HTTP prober backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: reqwest::Client,
    max_body: usize,
}

impl HttpProber {
    /// Build a prober whose `timeout` bounds the whole request, body included.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            client,
            max_body: MAX_BODY_BYTES,
        })
    }

    /// Override the body cap. Mostly useful in tests.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    async fn fetch(&self, target: Target) -> Result<Vec<u8>, ProbeError> {
        let mut response = self
            .client
            .get(target.url())
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, false))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        // Servers may stream forever; stop at the cap.
        let mut body = Vec::new();
        while body.len() < self.max_body {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_body - body.len();
                    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                Ok(None) => break,
                Err(e) => return Err(ProbeError::from_reqwest(e, true)),
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: Target) -> ProbeOutcome {
        match self.fetch(target).await {
            Ok(body) => {
                let text = String::from_utf8_lossy(&body);
                ProbeOutcome::responded(target, extract_title(&text), body.len())
            }
            Err(e) => {
                debug!(%target, "no response: {e}");
                ProbeOutcome::failed(target, e.to_string())
            }
        }
    }
}

/// Text between the first `<title>` and the next `</title>`, trimmed.
/// Inner line breaks become single spaces so the title stays on one line.
pub fn extract_title(body: &str) -> String {
    TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| LINE_BREAKS_RE.replace_all(m.as_str().trim(), " ").into_owned())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::random_range(0..USER_AGENTS.len())]
}
