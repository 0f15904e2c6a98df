//! Component C — region latency tracker
//!
//! Owns one `PeerTracker` per discovered peer region, reconciling the set
//! on a fixed interval as regions come and go, and exposes a merged
//! region-by-region latency matrix.

use crate::discovery::Discovery;
use crate::error::AppError;
use crate::tracker::PeerTracker;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

const ERROR_CHANNEL_CAPACITY: usize = 64;

struct TrackedPeer {
    tracker: Arc<PeerTracker>,
    handle: tokio::task::JoinHandle<()>,
}

/// Coordinates per-peer trackers for every other region in the fleet.
pub struct RegionTracker {
    self_region: String,
    app_name: String,
    zone: String,
    interval: Duration,
    window: usize,
    discovery: Arc<dyn Discovery>,
    peers: RwLock<HashMap<String, TrackedPeer>>,
    errors_tx: mpsc::Sender<(String, AppError)>,
    errors_rx: tokio::sync::Mutex<Option<mpsc::Receiver<(String, AppError)>>>,
    stopped: Arc<AtomicBool>,
}

impl RegionTracker {
    pub fn new(
        self_region: String,
        app_name: String,
        zone: String,
        interval: Duration,
        window: usize,
        discovery: Arc<dyn Discovery>,
    ) -> Arc<Self> {
        let (errors_tx, errors_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        Arc::new(Self {
            self_region,
            app_name,
            zone,
            interval,
            window,
            discovery,
            peers: RwLock::new(HashMap::new()),
            errors_tx,
            errors_rx: tokio::sync::Mutex::new(Some(errors_rx)),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Take ownership of the shared error stream. May only be called once;
    /// subsequent calls return `None`.
    pub async fn take_error_stream(&self) -> Option<mpsc::Receiver<(String, AppError)>> {
        self.errors_rx.lock().await.take()
    }

    fn peer_url(&self, region: &str) -> String {
        format!("http://{region}.{}.{}/latency.json", self.app_name, self.zone)
    }

    /// Run reconciliation forever, once per `interval`, until `stop` is
    /// called.
    pub async fn run(self: &Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            if let Err(e) = self.reconcile_once().await {
                warn!(error = %e, "discovery failed this tick, will retry next interval");
            }
        }
    }

    async fn reconcile_once(self: &Arc<Self>) -> Result<(), AppError> {
        let discovered = self.discovery.deployed_regions(self.interval).await?;

        let mut peers = self.peers.write().await;
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }

        for region in &discovered {
            if region == &self.self_region || peers.contains_key(region) {
                continue;
            }
            let url = self.peer_url(region);
            let tracker = PeerTracker::new(
                region.clone(),
                url,
                self.interval,
                self.window,
                self.errors_tx.clone(),
            );
            let handle = tracker.run();
            info!(region = %region, "started peer tracker");
            peers.insert(region.clone(), TrackedPeer { tracker, handle });
        }

        let discovered_set: std::collections::HashSet<&String> = discovered.iter().collect();
        let stale: Vec<String> = peers
            .keys()
            .filter(|r| !discovered_set.contains(r))
            .cloned()
            .collect();
        for region in stale {
            if let Some(peer) = peers.remove(&region) {
                peer.tracker.stop();
                peer.handle.abort();
                info!(region = %region, "stopped peer tracker (no longer discovered)");
            }
        }

        Ok(())
    }

    /// Snapshot the full region-by-region latency matrix: one row per
    /// tracked peer (the peer's own last-seen view) plus the self row
    /// built from each tracker's current SMA.
    pub async fn latencies(&self) -> HashMap<String, HashMap<String, i64>> {
        let peers = self.peers.read().await;

        let mut matrix = HashMap::with_capacity(peers.len() + 1);
        let mut self_row = HashMap::with_capacity(peers.len());
        for (region, peer) in peers.iter() {
            self_row.insert(region.clone(), peer.tracker.latency());
            matrix.insert(region.clone(), peer.tracker.latencies());
        }
        matrix.insert(self.self_region.clone(), self_row);
        matrix
    }

    /// This instance's own row: region -> latency_ms.
    pub async fn self_row(&self) -> HashMap<String, i64> {
        let peers = self.peers.read().await;
        peers
            .iter()
            .map(|(region, peer)| (region.clone(), peer.tracker.latency()))
            .collect()
    }

    /// Idempotent shutdown: stop every peer tracker and mark reconciliation
    /// to exit on its next tick.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return; // already stopped
        }
        let mut peers = self.peers.write().await;
        for (region, peer) in peers.drain() {
            peer.tracker.stop();
            peer.handle.abort();
            info!(region = %region, "stopped peer tracker (shutdown)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDiscovery;

    fn tracker_for_test(regions: Vec<&str>) -> Arc<RegionTracker> {
        let discovery = Arc::new(StaticDiscovery::new(
            regions.into_iter().map(String::from).collect(),
        ));
        RegionTracker::new(
            "self".into(),
            "app".into(),
            "internal".into(),
            Duration::from_millis(20),
            4,
            discovery,
        )
    }

    #[tokio::test]
    async fn reconcile_starts_trackers_for_discovered_peers() {
        let rt = tracker_for_test(vec!["dfw", "iad"]);
        rt.reconcile_once().await.unwrap();
        let peers = rt.peers.read().await;
        assert_eq!(peers.len(), 2);
        assert!(peers.contains_key("dfw"));
        assert!(peers.contains_key("iad"));
    }

    #[tokio::test]
    async fn reconcile_skips_self_region() {
        let rt = tracker_for_test(vec!["self", "dfw"]);
        rt.reconcile_once().await.unwrap();
        let peers = rt.peers.read().await;
        assert_eq!(peers.len(), 1);
        assert!(!peers.contains_key("self"));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let rt = tracker_for_test(vec!["dfw"]);
        rt.reconcile_once().await.unwrap();
        rt.stop().await;
        rt.stop().await;
        assert!(rt.peers.read().await.is_empty());
    }
}
