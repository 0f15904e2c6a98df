//! Per-path request counters served at `/stats.json` and `/metrics`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const TRACKED_PATHS: &[&str] = &["/latency.json", "/latencies.json", "/stats.json", "/"];

/// Counts successful GETs per path. Each successful request increments its
/// path's counter atomically (SPEC_FULL.md §4.D).
pub struct RequestStats {
    counters: HashMap<&'static str, AtomicU64>,
    start_time: Instant,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            counters: TRACKED_PATHS.iter().map(|&p| (p, AtomicU64::new(0))).collect(),
            start_time: Instant::now(),
        }
    }

    /// Record a successful GET on `path`. Unknown paths are ignored
    /// (they 404 before reaching here and are not tracked).
    pub fn record(&self, path: &str) {
        if let Some(counter) = self.counters.get(path) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Snapshot as JSON: path -> counter.
    pub fn to_json(&self) -> serde_json::Value {
        let counts: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|(path, count)| ((*path).to_string(), count.load(Ordering::Relaxed).into()))
            .collect();
        serde_json::Value::Object(counts)
    }

    /// Prometheus text exposition of the same counters plus uptime.
    pub fn export(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP region_select_requests_total Requests served per path\n");
        out.push_str("# TYPE region_select_requests_total counter\n");
        for (path, count) in &self.counters {
            out.push_str(&format!(
                "region_select_requests_total{{path=\"{path}\"}} {}\n",
                count.load(Ordering::Relaxed)
            ));
        }
        out.push_str("# HELP region_select_uptime_seconds Process uptime\n");
        out.push_str("# TYPE region_select_uptime_seconds counter\n");
        out.push_str(&format!("region_select_uptime_seconds {}\n", self.uptime_secs()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_known_path() {
        let stats = RequestStats::new();
        stats.record("/latency.json");
        stats.record("/latency.json");
        let json = stats.to_json();
        assert_eq!(json["/latency.json"], 2);
    }

    #[test]
    fn record_ignores_unknown_path() {
        let stats = RequestStats::new();
        stats.record("/does-not-exist");
        let json = stats.to_json();
        assert!(json.get("/does-not-exist").is_none());
    }
}
