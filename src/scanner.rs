use crate::probe::Probe;
use crate::sink::ResultSink;
use crate::types::{ProbeOutcome, ScanSession, ScanSummary, Target};
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of probes allowed in flight.
pub const DEFAULT_CONCURRENCY: usize = 500;

/// What a finished probe task reports to the aggregator.
#[derive(Debug)]
enum ScanEvent {
    Finished(ProbeOutcome),
    /// The probe task died before reporting; still counts as an attempt.
    Lost,
}

/// Probe every target once with at most `concurrency` probes in flight.
///
/// - Dispatches in list order; a `Semaphore` permit is taken before each spawn
///   and held by the task until it ends.
/// - A single aggregator task owns the `ScanSession` and the `ResultSink`, so
///   counting and recording an outcome happen together and never interleave.
/// - Returns once every dispatched probe has finished and been aggregated.
///
/// A `concurrency` of 0 is treated as 1.
pub async fn scan_targets<P>(
    targets: &[Target],
    concurrency: usize,
    prober: Arc<P>,
    sink: ResultSink,
) -> Result<ScanSummary>
where
    P: Probe + 'static,
{
    scan_targets_internal(targets, concurrency, prober, sink, CancellationToken::new()).await
}

/// Variant that stops dispatching once `cancel` fires. Probes already in
/// flight are allowed to finish.
pub async fn scan_targets_with_cancel<P>(
    targets: &[Target],
    concurrency: usize,
    prober: Arc<P>,
    sink: ResultSink,
    cancel: CancellationToken,
) -> Result<ScanSummary>
where
    P: Probe + 'static,
{
    scan_targets_internal(targets, concurrency, prober, sink, cancel).await
}

async fn scan_targets_internal<P>(
    targets: &[Target],
    concurrency: usize,
    prober: Arc<P>,
    sink: ResultSink,
    cancel: CancellationToken,
) -> Result<ScanSummary>
where
    P: Probe + 'static,
{
    let started_at = now_rfc3339();
    let total = targets.len() as u64;

    if targets.is_empty() {
        return Ok(ScanSummary {
            started_at: started_at.clone(),
            finished_at: started_at,
            ..ScanSummary::default()
        });
    }

    let concurrency = effective_concurrency(concurrency);
    info!(total, concurrency, "starting scan");

    let (tx, rx) = mpsc::channel::<ScanEvent>(concurrency);
    let aggregator = tokio::spawn(aggregate(rx, ScanSession::new(total), sink));

    let sem = Arc::new(Semaphore::new(concurrency));
    let mut set = JoinSet::new();
    let mut cancelled = false;

    for &target in targets {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = sem.clone().acquire_owned() => permit.context("capacity gate closed")?,
        };
        let prober = prober.clone();
        let task_tx = tx.clone();

        debug!(%target, "dispatching probe");
        set.spawn(async move {
            let _permit = permit; // released when the task ends, panic included
            let outcome = prober.probe(target).await;
            let _ = task_tx.send(ScanEvent::Finished(outcome)).await;
        });

        // Keep the set bounded by what is still in flight.
        reap_finished(&mut set, &tx).await;
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            report_lost(e, &tx).await;
        }
    }
    drop(tx);

    let (session, responded, sink) = aggregator.await.context("aggregator task failed")?;

    if cancelled {
        warn!(
            scanned = session.scanned(),
            total = session.total(),
            "scan cancelled before all targets were dispatched"
        );
    }

    Ok(ScanSummary {
        total: session.total(),
        scanned: session.scanned(),
        responded,
        recorded: sink.recorded(),
        cancelled,
        started_at,
        finished_at: now_rfc3339(),
    })
}

/// Remove tasks that have already finished without waiting on the rest.
/// Returns how many of them died before reporting.
async fn reap_finished(set: &mut JoinSet<()>, tx: &mpsc::Sender<ScanEvent>) -> usize {
    let mut lost = 0;
    while let Some(res) = set.try_join_next() {
        if let Err(e) = res {
            report_lost(e, tx).await;
            lost += 1;
        }
    }
    lost
}

async fn report_lost(err: JoinError, tx: &mpsc::Sender<ScanEvent>) {
    warn!("probe task failed: {err}");
    let _ = tx.send(ScanEvent::Lost).await;
}

/// Drain outcomes until every sender is gone.
async fn aggregate(
    mut rx: mpsc::Receiver<ScanEvent>,
    mut session: ScanSession,
    mut sink: ResultSink,
) -> (ScanSession, u64, ResultSink) {
    let mut responded = 0u64;
    while let Some(event) = rx.recv().await {
        let done = session.record_attempt();
        if let ScanEvent::Finished(outcome) = event {
            if outcome.success {
                responded += 1;
                sink.record(session.scanned(), session.total(), &outcome);
            }
        }
        if done {
            info!(scanned = session.scanned(), responded, "all targets probed");
        }
    }
    (session, responded, sink)
}

/// Clamp a requested concurrency to at least one.
pub fn effective_concurrency(requested: usize) -> usize {
    if requested == 0 {
        warn!("concurrency of 0 requested, using 1");
        1
    } else {
        requested.min(Semaphore::MAX_PERMITS)
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
