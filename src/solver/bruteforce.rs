//! Component F — brute-force solver
//!
//! Evaluates every K-subset (via the combination enumerator) against the
//! weighted cost matrix and keeps the minimum. Deterministic tie-break:
//! first subset seen in lexicographic order wins, since the enumerator's
//! order is itself deterministic.

use super::{validate_k, CostMatrix, SolveResult, Solver, Weights};
use crate::combinations::Combinations;
use crate::error::Result;

pub struct BruteForceSolver {
    matrix: CostMatrix,
}

impl BruteForceSolver {
    pub fn new(matrix: CostMatrix) -> Self {
        Self { matrix }
    }

    /// `WEC[s][d] = weight[s] * cost(s, d)`.
    fn weighted_cost(&self, weights: &Weights, s: usize, d: usize) -> f64 {
        weights.0[s] * self.matrix.cost(s, d)
    }

    fn combo_cost(&self, weights: &Weights, subset: &[usize]) -> f64 {
        let n = self.matrix.len();
        (0..n)
            .map(|s| {
                if weights.0[s] == 0.0 {
                    return 0.0;
                }
                subset
                    .iter()
                    .map(|&d| {
                        if d == s {
                            0.0
                        } else {
                            self.weighted_cost(weights, s, d)
                        }
                    })
                    .fold(f64::INFINITY, f64::min)
            })
            .sum()
    }
}

impl Solver for BruteForceSolver {
    fn solve(&self, k: usize, weights: &Weights) -> Result<SolveResult> {
        let n = self.matrix.len();
        validate_k(k, n)?;

        let mut best_cost = f64::INFINITY;
        let mut best_subset: Vec<usize> = Vec::new();

        let mut combinations = Combinations::new(n, k);
        let mut subset = Vec::with_capacity(k);
        while combinations.fill_next(&mut subset) {
            let cost = self.combo_cost(weights, &subset);
            if cost < best_cost {
                best_cost = cost;
                best_subset.clear();
                best_subset.extend_from_slice(&subset);
            }
        }

        let mut regions: Vec<String> = best_subset
            .into_iter()
            .map(|i| self.matrix.regions[i].clone())
            .collect();
        regions.sort();

        Ok(SolveResult { cost: best_cost, regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn triangle() -> (CostMatrix, Weights) {
        // A-B=60, A-C=30, B-C=30, weights A=0.4 B=0.3 C=0.3
        let mut matrix = HashMap::new();
        matrix.insert("a".to_string(), [("b", 60), ("c", 30)].into_iter().map(|(k, v)| (k.to_string(), v)).collect());
        matrix.insert("b".to_string(), [("a", 60), ("c", 30)].into_iter().map(|(k, v)| (k.to_string(), v)).collect());
        matrix.insert("c".to_string(), [("a", 30), ("b", 30)].into_iter().map(|(k, v)| (k.to_string(), v)).collect());
        let cm = CostMatrix::from_region_matrix(&matrix);
        let weights = Weights(
            cm.regions
                .iter()
                .map(|r| match r.as_str() {
                    "a" => 0.4,
                    "b" => 0.3,
                    "c" => 0.3,
                    _ => unreachable!(),
                })
                .collect(),
        );
        (cm, weights)
    }

    #[test]
    fn tiny_triangle_picks_c_with_cost_21() {
        let (cm, weights) = triangle();
        let solver = BruteForceSolver::new(cm);
        let result = solver.solve(1, &weights).unwrap();
        assert_eq!(result.regions, vec!["c".to_string()]);
        assert!((result.cost - 21.0).abs() < 1e-9, "cost was {}", result.cost);
    }

    #[test]
    fn k_equals_n_has_zero_cost_and_full_set() {
        let (cm, weights) = triangle();
        let n = cm.len();
        let solver = BruteForceSolver::new(cm.clone());
        let result = solver.solve(n, &weights).unwrap();
        assert_eq!(result.cost, 0.0);
        let mut all = cm.regions.clone();
        all.sort();
        assert_eq!(result.regions, all);
    }

    #[test]
    fn all_zero_weights_has_zero_cost() {
        let (cm, _) = triangle();
        let n = cm.len();
        let weights = Weights(vec![0.0; n]);
        let solver = BruteForceSolver::new(cm);
        let result = solver.solve(1, &weights).unwrap();
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.regions.len(), 1);
    }

    #[test]
    fn invalid_k_is_rejected() {
        let (cm, weights) = triangle();
        let n = cm.len();
        let solver = BruteForceSolver::new(cm);
        assert!(solver.solve(0, &weights).is_err());
        assert!(solver.solve(n + 1, &weights).is_err());
    }
}
