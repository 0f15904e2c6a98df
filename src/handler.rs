//! Component H — aggregator / HTTP request handler
//!
//! Accepts a Prometheus-style query result describing a per-region
//! traffic distribution and dispatches to the brute-force or ILP solver
//! (picked by K) to return the best region subset, plus any `compare`
//! subsets the caller asked to have evaluated without optimization.

use crate::metrics::RequestStats;
use crate::region_tracker::RegionTracker;
use crate::solver::bruteforce::BruteForceSolver;
use crate::solver::ilp::IlpSolver;
use crate::solver::{combination_cost, CostMatrix, Solver, Weights};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// K below this uses the brute-force solver; at or above it, the ILP
/// solver. A performance heuristic only — both must agree within
/// tolerance on identical input (SPEC_FULL.md §4.G "Cutover").
const BRUTE_FORCE_MAX_K: usize = 4;

#[derive(Debug, Deserialize)]
struct PromQueryBody {
    data: PromData,
}

#[derive(Debug, Deserialize)]
struct PromData {
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
struct PromSeries {
    metric: PromMetric,
    value: (serde_json::Value, String),
}

#[derive(Debug, Deserialize)]
struct PromMetric {
    region: Option<String>,
}

struct QueryParams {
    k: Option<usize>,
    compare: Vec<String>,
}

/// Parse `k` and repeated `compare` params straight from the raw query
/// string instead of axum's `Query` extractor, whose own rejection on a
/// malformed `k` would short-circuit the handler with a plain-text 4xx
/// body rather than the `{"error": "..."}`-shaped 500 every fatal error
/// here must return (SPEC_FULL.md §4.H / §7).
fn parse_query_params(raw: Option<&str>) -> std::result::Result<QueryParams, String> {
    let mut k = None;
    let mut compare = Vec::new();

    for pair in raw.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "k" => {
                k = Some(value.parse::<usize>().map_err(|_| {
                    format!("invalid k: {value:?} is not a non-negative integer")
                })?);
            }
            "compare" => compare.push(value.to_string()),
            _ => {}
        }
    }

    Ok(QueryParams { k, compare })
}

#[derive(Debug, Serialize)]
struct RegionResult {
    regions: Vec<String>,
    cost: f64,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    results: Vec<RegionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Parse the body into region -> count, skipping malformed rows with a
/// warning rather than failing the whole request.
fn parse_counts(body: &PromQueryBody) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for series in &body.data.result {
        let Some(region) = &series.metric.region else {
            warn!("skipping series with no region label");
            continue;
        };
        match series.value.1.parse::<u64>() {
            Ok(n) => {
                counts.insert(region.clone(), n);
            }
            Err(e) => warn!(region = %region, error = %e, "skipping series with unparsable count"),
        }
    }
    counts
}

/// The current (brute-force, ILP) solver pair, rebuilt every `interval`
/// from the region tracker's latest matrix and swapped in behind a
/// reader-writer lock. The rebuild task never holds the write lock while
/// building — only for the swap.
pub struct Aggregator {
    tracker: Arc<RegionTracker>,
    solvers: parking_lot::RwLock<Option<SolverPair>>,
    stats: Arc<RequestStats>,
}

struct SolverPair {
    matrix: CostMatrix,
    brute_force: BruteForceSolver,
    ilp: IlpSolver,
}

impl Aggregator {
    pub fn new(tracker: Arc<RegionTracker>, stats: Arc<RequestStats>) -> Arc<Self> {
        Arc::new(Self {
            tracker,
            solvers: parking_lot::RwLock::new(None),
            stats,
        })
    }

    /// Rebuild the solver pair every `interval` from the current region
    /// matrix, until the task is aborted by the caller.
    pub async fn run_rebuild_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let matrix_data = self.tracker.latencies().await;
            let cost_matrix = CostMatrix::from_region_matrix(&matrix_data);
            let pair = SolverPair {
                brute_force: BruteForceSolver::new(cost_matrix.clone()),
                ilp: IlpSolver::new(cost_matrix.clone()),
                matrix: cost_matrix,
            };
            *self.solvers.write() = Some(pair);
        }
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", post(handle_post))
            .with_state(self.clone())
    }
}

async fn handle_post(
    State(aggregator): State<Arc<Aggregator>>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Response {
    aggregator.stats.record("/");

    let params = match parse_query_params(raw_query.as_deref()) {
        Ok(params) => params,
        Err(e) => return error_response(&e),
    };

    let body: PromQueryBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return error_response(&format!("invalid request body: {e}")),
    };

    let guard = aggregator.solvers.read();
    let Some(pair) = guard.as_ref() else {
        return error_response("solver not yet initialized, retry shortly");
    };

    let counts = parse_counts(&body);
    let weights = Weights::normalize(&pair.matrix.regions, &counts);

    let unknown: Vec<&String> = counts
        .keys()
        .filter(|r| !pair.matrix.regions.contains(r))
        .collect();

    let mut results = Vec::new();
    let mut error = None;

    if let Some(k) = params.k {
        if k == 0 || k > pair.matrix.len() {
            return error_response(&format!("invalid k={k}: must be in [1, {}]", pair.matrix.len()));
        }
        let solver: &dyn Solver = if k < BRUTE_FORCE_MAX_K {
            &pair.brute_force
        } else {
            &pair.ilp
        };
        match solver.solve(k, &weights) {
            Ok(result) => results.push(RegionResult { regions: result.regions, cost: result.cost }),
            Err(e) => return error_response(&e.to_string()),
        }
    }

    for raw in &params.compare {
        let wanted: Vec<String> = raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if wanted.is_empty() {
            continue;
        }
        let indices: Vec<usize> = wanted
            .iter()
            .filter_map(|r| pair.matrix.regions.iter().position(|x| x == r))
            .collect();
        let cost = combination_cost(&pair.matrix, &weights, &indices);
        let mut regions = wanted;
        regions.sort();
        results.push(RegionResult { regions, cost });
    }

    if !unknown.is_empty() {
        let names = unknown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
        error = Some(format!("unknown regions: {names}"));
    }

    Json(QueryResponse { results, error }).into_response()
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
