use cutstock_solver::{ConstraintOp, LinearSolver, LpProblem, SolutionStatus, VariableKind};

use crate::error::{CutStockError, Result};
use crate::knapsack;
use crate::model::{Pattern, Problem};

/// How the pricing knapsack is solved
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PricingMethod {
    /// The dedicated knapsack solver in this crate
    #[default]
    Knapsack,
    /// The integer model from [`build_knapsack_model`], handed to the backend
    Solver,
}

/// Best pattern for the current dual prices
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Pricing {
    pub pattern: Pattern,
    /// `1 - Σ dual_i * count_i`; negative when the pattern improves the master
    pub reduced_cost: f64,
}

/// Bounded knapsack: `max Σ dual_i x_i  s.t.  Σ length_i x_i <= capacity`,
/// `x_i` integer in `[0, floor(capacity / length_i)]`
pub fn build_knapsack_model(problem: &Problem, duals: &[f64]) -> LpProblem {
    let mut model = LpProblem::new();
    for i in 0..problem.num_parts() {
        model.add_variable(
            format!("count_{}", i),
            0.0,
            problem.max_copies(i) as f64,
            VariableKind::Integer,
        );
    }
    model.set_objective(duals.to_vec(), false);
    model.add_constraint(
        "material_length",
        problem.parts.iter().map(|p| p.length).collect(),
        ConstraintOp::Le,
        problem.capacity(),
    );
    model
}

/// Finds the most valuable pattern under `duals` with the backend solver
pub fn price<S: LinearSolver>(solver: &S, problem: &Problem, duals: &[f64]) -> Result<Pricing> {
    let model = build_knapsack_model(problem, duals);
    let solution = solver.solve(&model);

    if !solution.is_optimal() {
        return Err(CutStockError::PricingNotOptimal {
            status: solution.status,
        });
    }

    let counts = solution.values.iter().map(|&x| x.round().max(0.0) as u32);
    finish(problem, duals, Pattern::from_counts(counts.enumerate()))
}

/// Finds the most valuable pattern under `duals` with the dedicated
/// knapsack solver
pub fn price_knapsack(problem: &Problem, duals: &[f64]) -> Result<Pricing> {
    let counts = knapsack::solve(problem, duals).ok_or(CutStockError::PricingNotOptimal {
        status: SolutionStatus::IterationLimit,
    })?;
    finish(problem, duals, Pattern::from_counts(counts.into_iter().enumerate()))
}

fn finish(problem: &Problem, duals: &[f64], pattern: Pattern) -> Result<Pricing> {
    if !pattern.fits(problem) {
        return Err(CutStockError::PatternOverflow {
            used: pattern.used_length(problem),
            capacity: problem.material_length,
        });
    }

    // Recomputed from the integer counts rather than the solver's objective
    let value: f64 = pattern.iter().map(|(i, n)| duals[i] * n as f64).sum();

    Ok(Pricing {
        pattern,
        reduced_cost: 1.0 - value,
    })
}
