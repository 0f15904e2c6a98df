//! Component D — publisher
//!
//! Serves the local region's latency row, the full region matrix, and
//! per-path request counts as JSON. A background ticker re-marshals
//! snapshots from the region tracker's current state every second and
//! swaps them behind a lock; handlers serve the latest snapshot without
//! blocking on marshaling (SPEC_FULL.md §4.D).

use crate::error::{AppError, Result};
use crate::metrics::RequestStats;
use crate::region_tracker::RegionTracker;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DOCS: &str = "region-select\n\n\
GET  /latency.json    self region's latency to every tracked peer (ms)\n\
GET  /latencies.json  full region-by-region latency matrix (ms)\n\
GET  /stats.json      per-path request counters\n\
GET  /metrics         Prometheus text exposition\n\
POST /?k=N&compare=a,b  pick the best N-region subset / evaluate a subset\n";

struct Snapshot {
    self_row: serde_json::Value,
    full_matrix: serde_json::Value,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            self_row: serde_json::json!({}),
            full_matrix: serde_json::json!({}),
        }
    }
}

#[derive(Clone)]
struct AppState {
    snapshot: Arc<RwLock<Snapshot>>,
    stats: Arc<RequestStats>,
}

/// Serves latency data and request statistics over HTTP.
pub struct Publisher {
    bind_addr: String,
    tracker: Arc<RegionTracker>,
    tick: Duration,
    state: AppState,
}

impl Publisher {
    pub fn new(bind_addr: String, tracker: Arc<RegionTracker>, tick: Duration) -> Self {
        Self {
            bind_addr,
            tracker,
            tick,
            state: AppState {
                snapshot: Arc::new(RwLock::new(Snapshot::empty())),
                stats: Arc::new(RequestStats::new()),
            },
        }
    }

    /// Shared request-stats handle, for wiring into other components that
    /// want to record their own hits (e.g. the aggregator's `/` route).
    pub fn stats(&self) -> Arc<RequestStats> {
        self.state.stats.clone()
    }

    /// GET routes this component owns. Merged with the aggregator's POST
    /// `/` route by the caller that wires the full app together.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/latency.json", get(latency_json))
            .route("/latencies.json", get(latencies_json))
            .route("/stats.json", get(stats_json))
            .route("/metrics", get(metrics_text))
            .route("/", get(docs_text))
            .with_state(self.state.clone())
    }

    /// Spawn the 1s snapshot-rebuild ticker.
    fn spawn_ticker(&self) -> tokio::task::JoinHandle<()> {
        let tracker = self.tracker.clone();
        let snapshot = self.state.snapshot.clone();
        let tick = self.tick;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                ticker.tick().await;
                let self_row = tracker.self_row().await;
                let full_matrix = tracker.latencies().await;
                let new_snapshot = Snapshot {
                    self_row: serde_json::to_value(&self_row).unwrap_or(serde_json::json!({})),
                    full_matrix: serde_json::to_value(&full_matrix).unwrap_or(serde_json::json!({})),
                };
                *snapshot.write() = new_snapshot;
            }
        })
    }

    /// Run the server until `shutdown` resolves, draining in-flight
    /// handlers first. `extra_routes` is merged in (the aggregator's POST
    /// `/` route) so the whole HTTP surface is served from one listener.
    pub async fn run(
        &self,
        extra_routes: Router,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let _ticker = self.spawn_ticker();

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|e| AppError::Bind(e.to_string()))?;
        info!(addr = %self.bind_addr, "publisher listening");

        let app = self.router().merge(extra_routes);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AppError::Bind(e.to_string()))?;

        Ok(())
    }
}

async fn latency_json(State(state): State<AppState>) -> Response {
    state.stats.record("/latency.json");
    Json(state.snapshot.read().self_row.clone()).into_response()
}

async fn latencies_json(State(state): State<AppState>) -> Response {
    state.stats.record("/latencies.json");
    Json(state.snapshot.read().full_matrix.clone()).into_response()
}

async fn stats_json(State(state): State<AppState>) -> Response {
    state.stats.record("/stats.json");
    Json(state.stats.to_json()).into_response()
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    (StatusCode::OK, state.stats.export()).into_response()
}

async fn docs_text(State(state): State<AppState>) -> Response {
    state.stats.record("/");
    (StatusCode::OK, DOCS).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDiscovery;

    fn test_tracker() -> Arc<RegionTracker> {
        RegionTracker::new(
            "self".into(),
            "app".into(),
            "internal".into(),
            Duration::from_secs(30),
            4,
            Arc::new(StaticDiscovery::new(vec![])),
        )
    }

    #[tokio::test]
    async fn empty_snapshot_serializes_to_empty_object() {
        let publisher = Publisher::new("127.0.0.1:0".into(), test_tracker(), Duration::from_millis(10));
        let snapshot = publisher.state.snapshot.read();
        assert_eq!(snapshot.self_row, serde_json::json!({}));
    }

    #[tokio::test]
    async fn stats_count_recorded_hits() {
        let publisher = Publisher::new("127.0.0.1:0".into(), test_tracker(), Duration::from_millis(10));
        publisher.state.stats.record("/latency.json");
        let json = publisher.state.stats.to_json();
        assert_eq!(json["/latency.json"], 1);
    }
}
