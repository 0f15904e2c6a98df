//! Component B — single-peer latency tracker
//!
//! Periodically probes one peer region, computes a simple moving average
//! of round-trip latency over the last W samples, and caches that peer's
//! most recently fetched view of the full region matrix.

use crate::error::{AppError, Result};
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Reported when a tracker has never completed a successful probe.
pub const INFINITE_LATENCY_MS: i64 = i64::MAX;

/// Capacity of the bounded error channel each tracker writes to. A full
/// channel means nobody is reading errors; probing must not stall for it,
/// so sends use `try_send` and drop on `Full`.
const ERROR_CHANNEL_CAPACITY: usize = 16;

struct RingState {
    samples: Vec<i64>,
    write_pos: usize,
    sma_ms: i64,
    last_seen: HashMap<String, i64>,
}

impl RingState {
    fn new(window: usize) -> Self {
        Self {
            samples: vec![0; window],
            write_pos: 0,
            sma_ms: INFINITE_LATENCY_MS,
            last_seen: HashMap::new(),
        }
    }

    fn window(&self) -> usize {
        self.samples.len()
    }

    fn record(&mut self, sample_ms: i64) {
        let w = self.window();
        self.samples[self.write_pos % w] = sample_ms;
        self.write_pos += 1;
        let valid = self.write_pos.min(w);
        let sum: i64 = self.samples[..valid].iter().sum();
        self.sma_ms = sum / valid as i64;
    }
}

/// Tracks latency to a single peer region.
pub struct PeerTracker {
    region: String,
    url: String,
    interval: Duration,
    http: Client,
    state: RwLock<RingState>,
    stopped: Arc<AtomicBool>,
    errors: mpsc::Sender<(String, AppError)>,
}

impl PeerTracker {
    /// Create a tracker targeting `url` for `region`, probing every
    /// `interval` with a matching per-request timeout. Errors are relayed
    /// on `errors`, annotated with `region`.
    pub fn new(
        region: String,
        url: String,
        interval: Duration,
        window: usize,
        errors: mpsc::Sender<(String, AppError)>,
    ) -> Arc<Self> {
        let http = Client::builder()
            .timeout(interval)
            .build()
            .expect("failed to build HTTP client");

        Arc::new(Self {
            region,
            url,
            interval,
            http,
            state: RwLock::new(RingState::new(window.max(1))),
            stopped: Arc::new(AtomicBool::new(false)),
            errors,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Current SMA in milliseconds, or `INFINITE_LATENCY_MS` before the
    /// first successful probe.
    pub fn latency(&self) -> i64 {
        self.state.read().sma_ms
    }

    /// The peer's own last-reported view of every region's latency.
    pub fn latencies(&self) -> HashMap<String, i64> {
        self.state.read().last_seen.clone()
    }

    /// Spawn the probe loop. Returns a handle that can be awaited after
    /// calling `stop`.
    pub fn run(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run_loop().await })
    }

    async fn run_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            if let Err(e) = self.probe_once().await {
                debug!(region = %self.region, error = %e, "probe failed");
                // Bounded, non-blocking: a slow/absent consumer must never
                // stall the prober.
                if self.errors.try_send((self.region.clone(), e)).is_err() {
                    warn!(region = %self.region, "error channel full or closed, dropping probe error");
                }
            }
        }
    }

    async fn probe_once(&self) -> Result<()> {
        let t_wrote = Instant::now();
        let resp = self.http.get(&self.url).send().await?;
        let t_first = Instant::now();

        if t_first <= t_wrote {
            return Err(AppError::Timing(format!(
                "non-positive RTT observed for {}",
                self.region
            )));
        }
        let rtt_ms = (t_first - t_wrote).as_millis() as i64;

        let body: HashMap<String, i64> = resp.json().await?;

        let mut state = self.state.write();
        state.record(rtt_ms);
        state.last_seen = body;
        Ok(())
    }

    /// Stop probing. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_window(window: usize) -> Arc<PeerTracker> {
        let (tx, _rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        PeerTracker::new(
            "tst".into(),
            "http://127.0.0.1:1/latency.json".into(),
            Duration::from_secs(30),
            window,
            tx,
        )
    }

    #[test]
    fn reports_infinite_before_first_sample() {
        let t = tracker_with_window(4);
        assert_eq!(t.latency(), INFINITE_LATENCY_MS);
    }

    #[test]
    fn sma_matches_mean_of_retained_window() {
        let t = tracker_with_window(3);
        {
            let mut state = t.state.write();
            state.record(10);
            state.record(20);
        }
        assert_eq!(t.latency(), 15);
        {
            let mut state = t.state.write();
            state.record(30);
            state.record(100); // evicts the first sample (10)
        }
        // window now holds [100, 20, 30] in some order -> mean = 50
        assert_eq!(t.latency(), 50);
    }

    #[test]
    fn sample_count_equals_min_n_and_window() {
        let t = tracker_with_window(5);
        for i in 0..3 {
            t.state.write().record(i);
        }
        let valid = t.state.read().write_pos.min(t.state.read().window());
        assert_eq!(valid, 3);
    }

    #[test]
    fn stop_is_idempotent() {
        let t = tracker_with_window(2);
        t.stop();
        t.stop();
        assert!(t.stopped.load(Ordering::Acquire));
    }
}
