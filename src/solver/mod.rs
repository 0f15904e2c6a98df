//! Shared solver types for the weighted K-facility selection problem
//! (SPEC_FULL.md §4.F/§4.G). Both solvers satisfy the same capability:
//! given K and a weight vector, return `(cost, sorted regions)`.

pub mod bruteforce;
pub mod ilp;

use crate::error::{AppError, Result};
use std::collections::HashMap;

/// A sentinel cost standing in for "no measurement between these two
/// regions exists yet". Much larger than any real cost so it is never
/// chosen over a measured edge, but finite so arithmetic on it stays
/// well-defined.
pub const INFINITE_COST: f64 = 1.0e12;

/// Symmetric N×N cost matrix stored as a lower triangle: `rows[i-1][j]`
/// holds `cost(vertex_i, vertex_j)` for `j < i` (SPEC_FULL.md §4, "Cost
/// matrix").
#[derive(Debug, Clone)]
pub struct CostMatrix {
    pub regions: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl CostMatrix {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// `cost(i, j)`. `cost(v, v) == 0.0` for all v; panics if `i` or `j` is
    /// out of range (a programmer error, not a recoverable fault).
    pub fn cost(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.len() && j < self.len(), "vertex index out of range");
        if i == j {
            return 0.0;
        }
        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        self.rows[hi - 1][lo]
    }

    /// Build a symmetric cost matrix from a (possibly asymmetric,
    /// possibly incomplete) region-by-region latency matrix. When both
    /// directions are present, the cost is their arithmetic mean; when
    /// only one is present, it is used directly; when neither is present,
    /// `INFINITE_COST` is used.
    pub fn from_region_matrix(matrix: &HashMap<String, HashMap<String, i64>>) -> Self {
        let mut regions: Vec<String> = matrix.keys().cloned().collect();
        for row in matrix.values() {
            for region in row.keys() {
                if !regions.contains(region) {
                    regions.push(region.clone());
                }
            }
        }
        regions.sort();

        let n = regions.len();
        let mut rows: Vec<Vec<f64>> = (1..n).map(|i| vec![0.0; i]).collect();

        for i in 1..n {
            for j in 0..i {
                let forward = matrix.get(&regions[i]).and_then(|r| r.get(&regions[j]));
                let backward = matrix.get(&regions[j]).and_then(|r| r.get(&regions[i]));
                let cost = match (forward, backward) {
                    (Some(&f), Some(&b)) => (f as f64 + b as f64) / 2.0,
                    (Some(&f), None) => f as f64,
                    (None, Some(&b)) => b as f64,
                    (None, None) => INFINITE_COST,
                };
                rows[i - 1][j] = cost;
            }
        }

        Self { regions, rows }
    }
}

/// Non-negative weight vector, one entry per region in the same order as
/// `CostMatrix::regions`. Sums to at most 1.0 (all-zero when the source
/// traffic distribution summed to zero).
#[derive(Debug, Clone)]
pub struct Weights(pub Vec<f64>);

impl Weights {
    /// Build weights aligned to `regions`, normalizing `counts` by their
    /// sum. Regions absent from `counts` get weight 0. An all-zero (or
    /// empty) count map yields an all-zero weight vector.
    pub fn normalize(regions: &[String], counts: &HashMap<String, u64>) -> Self {
        let total: u64 = counts.values().sum();
        if total == 0 {
            return Weights(vec![0.0; regions.len()]);
        }
        let w = regions
            .iter()
            .map(|r| counts.get(r).copied().unwrap_or(0) as f64 / total as f64)
            .collect();
        Weights(w)
    }
}

/// The outcome of either solver: an objective cost and the chosen sink
/// regions, sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub cost: f64,
    pub regions: Vec<String>,
}

/// Capability shared by both solver implementations.
pub trait Solver {
    /// Solve for the best K-subset of sinks under `weights`.
    fn solve(&self, k: usize, weights: &Weights) -> Result<SolveResult>;
}

/// Evaluate a caller-supplied subset's cost under the current weights,
/// without claiming optimality (used for `compare` requests, SPEC_FULL.md
/// §4.H step 6).
pub fn combination_cost(matrix: &CostMatrix, weights: &Weights, subset: &[usize]) -> f64 {
    (0..matrix.len())
        .map(|s| {
            let w = weights.0[s];
            if w == 0.0 {
                return 0.0;
            }
            subset
                .iter()
                .map(|&d| w * matrix.cost(s, d))
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

pub(crate) fn validate_k(k: usize, n: usize) -> Result<()> {
    if k == 0 || k > n {
        return Err(AppError::InvalidK(format!("k={k} out of range [1, {n}]")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_matrix(pairs: &[(&str, &str, i64)]) -> HashMap<String, HashMap<String, i64>> {
        let mut m: HashMap<String, HashMap<String, i64>> = HashMap::new();
        for &(a, b, v) in pairs {
            m.entry(a.to_string()).or_default().insert(b.to_string(), v);
        }
        m
    }

    #[test]
    fn symmetrization_averages_both_directions() {
        let matrix = region_matrix(&[("a", "b", 60), ("b", "a", 40)]);
        let cm = CostMatrix::from_region_matrix(&matrix);
        let ai = cm.regions.iter().position(|r| r == "a").unwrap();
        let bi = cm.regions.iter().position(|r| r == "b").unwrap();
        assert_eq!(cm.cost(ai, bi), 50.0);
    }

    #[test]
    fn symmetrization_uses_single_direction() {
        let matrix = region_matrix(&[("a", "b", 60)]);
        let cm = CostMatrix::from_region_matrix(&matrix);
        let ai = cm.regions.iter().position(|r| r == "a").unwrap();
        let bi = cm.regions.iter().position(|r| r == "b").unwrap();
        assert_eq!(cm.cost(ai, bi), 60.0);
    }

    #[test]
    fn symmetrization_uses_sentinel_when_neither_direction_present() {
        let mut matrix = region_matrix(&[("a", "b", 60)]);
        matrix.entry("c".to_string()).or_default();
        let cm = CostMatrix::from_region_matrix(&matrix);
        let ai = cm.regions.iter().position(|r| r == "a").unwrap();
        let ci = cm.regions.iter().position(|r| r == "c").unwrap();
        assert_eq!(cm.cost(ai, ci), INFINITE_COST);
    }

    #[test]
    fn weight_normalization_sums_to_one() {
        let regions = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut counts = HashMap::new();
        counts.insert("a".to_string(), 4u64);
        counts.insert("b".to_string(), 3);
        counts.insert("c".to_string(), 3);
        let w = Weights::normalize(&regions, &counts);
        let sum: f64 = w.0.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_count_map_yields_all_zero_weights() {
        let regions = vec!["a".to_string(), "b".to_string()];
        let counts = HashMap::new();
        let w = Weights::normalize(&regions, &counts);
        assert_eq!(w.0, vec![0.0, 0.0]);
    }
}
