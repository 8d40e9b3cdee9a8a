use cutstock_solver::{ConstraintOp, LinearSolver, LpProblem, Solution, VariableKind};

use crate::error::{CutStockError, Result};
use crate::model::{PatternPool, Problem};

/// Optimal restricted master relaxation
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Relaxation {
    /// Fractional number of material units; a lower bound for the pool
    pub objective: f64,
    /// Per part, the objective change for one more unit of demand
    pub duals: Vec<f64>,
    /// Fractional units per pattern, in pool order
    pub values: Vec<f64>,
}

/// Builds `min Σ x_j  s.t.  Σ_j count_ij x_j >= demand_i`, one variable per
/// pattern and one row per part
pub fn build_allocation_model(problem: &Problem, pool: &PatternPool, kind: VariableKind) -> LpProblem {
    let mut model = LpProblem::new();
    for j in 0..pool.len() {
        model.add_variable(format!("pattern_{}", j), 0.0, f64::INFINITY, kind);
    }
    model.set_objective(vec![1.0; pool.len()], true);

    for (i, part) in problem.parts.iter().enumerate() {
        let row = pool.iter().map(|p| p.count(i) as f64).collect();
        model.add_constraint(
            format!("demand_{}_len_{}", i, part.length),
            row,
            ConstraintOp::Ge,
            part.demand as f64,
        );
    }
    model
}

pub(crate) fn violation_messages(solution: &Solution) -> Vec<String> {
    solution.violations.iter().map(|v| v.description.clone()).collect()
}

/// Solves the continuous relaxation of the allocation over `pool`
pub fn solve_relaxation<S: LinearSolver>(solver: &S, problem: &Problem, pool: &PatternPool) -> Result<Relaxation> {
    let model = build_allocation_model(problem, pool, VariableKind::Continuous);
    let solution = solver.solve(&model);

    if !solution.is_optimal() {
        return Err(CutStockError::MasterNotOptimal {
            status: solution.status,
            violations: violation_messages(&solution),
        });
    }

    Ok(Relaxation {
        objective: solution.objective_value,
        duals: solution.duals(),
        values: solution.values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pattern;
    use cutstock_solver::{MilpSolver, SolutionStatus};

    #[test]
    fn test_relaxation_of_seed_pool() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let pool = PatternPool::seeded(&problem);

        let relaxation = solve_relaxation(&MilpSolver::new(), &problem, &pool).unwrap();

        // 2/3 of a 3x3 pattern plus one 2x4 pattern
        assert!((relaxation.objective - 5.0 / 3.0).abs() < 1e-9);
        assert!((relaxation.duals[0] - 1.0 / 3.0).abs() < 1e-9);
        assert!((relaxation.duals[1] - 0.5).abs() < 1e-9);
        assert_eq!(relaxation.values.len(), 2);
    }

    #[test]
    fn test_relaxation_on_arbitrary_pool() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let mut pool = PatternPool::new();
        pool.push(Pattern::from_counts([(0, 2), (1, 1)]));
        pool.push(Pattern::single(1, 2));

        let relaxation = solve_relaxation(&MilpSolver::new(), &problem, &pool).unwrap();

        // One 3,3,4 cut covers part 0; half a 4,4 cut covers the rest of part 1
        assert!((relaxation.objective - 1.5).abs() < 1e-9);
        let covered: f64 = pool.iter().zip(&relaxation.values).map(|(p, x)| p.count(1) as f64 * x).sum();
        assert!(covered >= 2.0 - 1e-9);
    }

    #[test]
    fn test_uncoverable_part_is_infeasible() {
        let problem = Problem::from_lists(10.0, &[3.0, 12.0], &[2, 1]);
        let pool = PatternPool::seeded(&problem);

        let err = solve_relaxation(&MilpSolver::new(), &problem, &pool).unwrap_err();

        match err {
            CutStockError::MasterNotOptimal { status, violations } => {
                assert_eq!(status, SolutionStatus::Infeasible);
                assert!(violations.iter().any(|v| v.contains("demand_1_len_12")), "{:?}", violations);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
