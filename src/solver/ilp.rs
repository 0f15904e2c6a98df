//! Component G — ILP solver
//!
//! Encodes K-facility selection as a 0/1 program (SPEC_FULL.md §4.G) and
//! solves it with `good_lp`'s pure-Rust `microlp` backend. The structural
//! constraints (every vertex is itself a sink or assigned to exactly one)
//! are the same for every request against a given cost matrix; only the
//! `sum(x) = k` constraint and the objective vary per solve.

use super::{validate_k, CostMatrix, SolveResult, Solver, Weights};
use crate::error::{AppError, Result};
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};

/// Column index of the directed-assignment variable `y_{s,d}` within the
/// `N*(N-1)` block that follows the `N` sink-selection variables `x_v`.
/// Must stay consistent between construction and solution read-out
/// (SPEC_FULL.md, "Triangular cost storage").
fn edge_index(n: usize, s: usize, d: usize) -> usize {
    debug_assert_ne!(s, d, "edge(v, v) is undefined");
    n + s * (n - 1) + if d < s { d } else { d - 1 }
}

pub struct IlpSolver {
    matrix: CostMatrix,
}

impl IlpSolver {
    pub fn new(matrix: CostMatrix) -> Self {
        Self { matrix }
    }
}

impl Solver for IlpSolver {
    fn solve(&self, k: usize, weights: &Weights) -> Result<SolveResult> {
        let n = self.matrix.len();
        validate_k(k, n)?;

        let mut vars = ProblemVariables::new();
        let x: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();
        // y[edge_index(n, s, d)] = y_{s,d}; entries where s == d are unused.
        let mut y: Vec<Option<Variable>> = vec![None; n * (n.saturating_sub(1))];
        for s in 0..n {
            for d in 0..n {
                if s == d {
                    continue;
                }
                y[edge_index(n, s, d)] = Some(vars.add(variable().binary()));
            }
        }
        let y = |s: usize, d: usize| -> Variable {
            y[edge_index(n, s, d)].expect("edge variable must exist for s != d")
        };

        let objective: Expression = (0..n)
            .flat_map(|s| (0..n).filter(move |&d| d != s).map(move |d| (s, d)))
            .map(|(s, d)| weights.0[s] * self.matrix.cost(s, d) * y(s, d))
            .sum();

        let mut problem = vars.minimise(objective).using(good_lp::microlp);

        // x_d - y_{s,d} >= 0: a source may be assigned to d only if d is chosen.
        for s in 0..n {
            for d in 0..n {
                if s == d {
                    continue;
                }
                problem = problem.with(constraint!(x[d] - y(s, d) >= 0));
            }
        }

        // x_s + sum_{d != s} y_{s,d} == 1: every vertex is itself chosen or
        // assigned to exactly one chosen sink.
        for s in 0..n {
            let assigned: Expression = (0..n).filter(|&d| d != s).map(|d| y(s, d)).sum();
            problem = problem.with(constraint!(x[s] + assigned == 1));
        }

        // Per-request constraint: exactly k sinks chosen.
        let sum_x: Expression = x.iter().copied().sum();
        problem = problem.with(constraint!(sum_x == k as f64));

        let solution = problem
            .solve()
            .map_err(|e| AppError::Solver(format!("{e:?}")))?;

        let mut regions: Vec<String> = (0..n)
            .filter(|&v| solution.value(x[v]) > 0.5)
            .map(|v| self.matrix.regions[v].clone())
            .collect();
        regions.sort();

        let cost: f64 = (0..n)
            .flat_map(|s| (0..n).filter(move |&d| d != s).map(move |d| (s, d)))
            .map(|(s, d)| weights.0[s] * self.matrix.cost(s, d) * solution.value(y(s, d)))
            .sum();

        Ok(SolveResult { cost, regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::bruteforce::BruteForceSolver;
    use std::collections::HashMap;

    fn triangle() -> (CostMatrix, Weights) {
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
    fn edge_index_is_injective_for_fixed_n() {
        let n = 5;
        let mut seen = std::collections::HashSet::new();
        for s in 0..n {
            for d in 0..n {
                if s == d {
                    continue;
                }
                assert!(seen.insert(edge_index(n, s, d)));
            }
        }
    }

    #[test]
    fn ilp_matches_bruteforce_on_tiny_triangle() {
        let (cm, weights) = triangle();
        let ilp = IlpSolver::new(cm.clone());
        let bf = BruteForceSolver::new(cm);
        let ilp_result = ilp.solve(1, &weights).unwrap();
        let bf_result = bf.solve(1, &weights).unwrap();
        assert_eq!(ilp_result.regions, bf_result.regions);
        assert!((ilp_result.cost - bf_result.cost).abs() < 1e-4);
    }

    #[test]
    fn k_equals_n_has_zero_cost() {
        let (cm, weights) = triangle();
        let n = cm.len();
        let ilp = IlpSolver::new(cm);
        let result = ilp.solve(n, &weights).unwrap();
        assert!(result.cost.abs() < 1e-9);
    }
}
