//! Frame delivery to the surface controller and the scheduled push loop.
//!
//! Delivery runs on its own task so a slow or unreachable board never
//! delays the next cycle; failures are logged and counted, never fatal.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use ris_core::{Cycle, CycleDriver, OutputFrame};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug)]
pub enum TransportError {
    /// Board unreachable or connection not yet established.
    NotConnected(String),
    /// Board answered with a non-success status.
    Rejected { status: u16 },
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected(msg) => write!(f, "not connected: {msg}"),
            TransportError::Rejected { status } => write!(f, "rejected with status {status}"),
            TransportError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// What the board sent back for a delivered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync + 'static {
    fn deliver(
        &self,
        frame: OutputFrame,
    ) -> impl Future<Output = std::result::Result<Response, TransportError>> + Send;
}

/// POSTs each frame as `text/plain` to the board's bridge endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    async fn deliver(&self, frame: OutputFrame) -> std::result::Result<Response, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(frame.into_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    TransportError::NotConnected(e.to_string())
                } else {
                    TransportError::Io(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Response {
            status: status.as_u16(),
            body,
        })
    }
}

/// Writes frames to stdout; used when no push URL is configured.
pub struct StdoutTransport;

impl Transport for StdoutTransport {
    async fn deliver(&self, frame: OutputFrame) -> std::result::Result<Response, TransportError> {
        println!("{frame}");
        Ok(Response {
            status: 200,
            body: String::new(),
        })
    }
}

pub fn log_cycle(cycle: &Cycle, schedule_len: usize) {
    tracing::info!(
        "cycle {}/{}: phase={}° steering={}° | col0: {}",
        cycle.schedule_index + 1,
        schedule_len,
        cycle.base_phase,
        cycle.steering_angle_deg,
        cycle.pattern.values().first().copied().unwrap_or_default()
    );
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushSummary {
    pub cycles: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

/// Compute one frame per tick and hand it to the transport until
/// `max_cycles` is reached or `shutdown` fires.
pub async fn run_push<T: Transport>(
    driver: &mut CycleDriver,
    transport: Arc<T>,
    interval: Duration,
    max_cycles: Option<usize>,
    shutdown: CancellationToken,
) -> Result<PushSummary> {
    let tracker = TaskTracker::new();
    let counters = Arc::new(Counters::default());
    let schedule_len = driver.config().schedule.len();
    // interval() rejects a zero period
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cycles = 0;

    while max_cycles.is_none_or(|max| cycles < max) {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("push loop cancelled after {cycles} cycles");
                break;
            }
            _ = ticker.tick() => {}
        }

        let cycle = driver
            .next_cycle()
            .context("match stage: failed to compute frame")?;
        log_cycle(&cycle, schedule_len);
        cycles += 1;

        let transport = Arc::clone(&transport);
        let counters = Arc::clone(&counters);
        let frame = cycle.frame;
        tracker.spawn(async move {
            match transport.deliver(frame).await {
                Ok(response) => {
                    tracing::debug!(
                        "delivered frame (status {}, {} byte reply)",
                        response.status,
                        response.body.len()
                    );
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!("deliver stage: transport failure: {e}");
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    tracker.close();
    tracker.wait().await;

    Ok(PushSummary {
        cycles,
        delivered: counters.delivered.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
    })
}
