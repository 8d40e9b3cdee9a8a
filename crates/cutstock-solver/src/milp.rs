use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution as _, SolverModel, Variable as Column, constraint, microlp,
    variable,
};

use crate::backend::LinearSolver;
use crate::problem::{ConstraintOp, LpProblem, VariableKind};
use crate::simplex::Solver;
use crate::solution::{Solution, SolutionStatus};

/// Mixed-integer backend over `good_lp`'s microlp solver.
///
/// Models without integer variables go to the simplex [`Solver`] instead,
/// since only it reports shadow prices. When an integer model is
/// infeasible, its continuous relaxation is re-solved so that rows which
/// cannot be met are reported as violations.
#[derive(Debug, Clone, Default)]
pub struct MilpSolver {
    relaxation: Solver,
}

impl MilpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if !problem.has_integer_variables() {
            return self.relaxation.solve(problem);
        }

        match solve_integer(problem) {
            Ok(values) => {
                let objective_value = problem.evaluate(&values);
                Solution::optimal(values, objective_value)
            }
            Err(ResolutionError::Infeasible) => {
                let relaxed = self.relaxation.solve(problem);
                if relaxed.status == SolutionStatus::Infeasible {
                    relaxed
                } else {
                    Solution::infeasible()
                }
            }
            Err(ResolutionError::Unbounded) => Solution::unbounded(),
            Err(_) => Solution::failed(),
        }
    }
}

impl LinearSolver for MilpSolver {
    fn solve(&self, problem: &LpProblem) -> Solution {
        MilpSolver::solve(self, problem)
    }
}

fn solve_integer(problem: &LpProblem) -> Result<Vec<f64>, ResolutionError> {
    let mut vars = ProblemVariables::new();
    let columns: Vec<Column> = problem
        .variables
        .iter()
        .map(|v| {
            let mut def = variable().name(v.name.clone()).min(v.lower);
            if v.upper.is_finite() {
                def = def.max(v.upper);
            }
            if v.kind == VariableKind::Integer {
                def = def.integer();
            }
            vars.add(def)
        })
        .collect();

    let objective = linear(&problem.objective.coefficients, &columns);
    let unsolved = if problem.objective.minimize {
        vars.minimise(objective)
    } else {
        vars.maximise(objective)
    };

    let mut model = unsolved.using(microlp);
    for c in &problem.constraints {
        // Rows without terms are decided here; microlp is only given real rows
        if c.coefficients.iter().all(|&a| a == 0.0) {
            let holds = match c.op {
                ConstraintOp::Le => c.rhs >= 0.0,
                ConstraintOp::Ge => c.rhs <= 0.0,
                ConstraintOp::Eq => c.rhs == 0.0,
            };
            if !holds {
                return Err(ResolutionError::Infeasible);
            }
            continue;
        }
        let lhs = linear(&c.coefficients, &columns);
        let rhs = c.rhs;
        model = match c.op {
            ConstraintOp::Le => model.with(constraint!(lhs <= rhs)),
            ConstraintOp::Ge => model.with(constraint!(lhs >= rhs)),
            ConstraintOp::Eq => model.with(constraint!(lhs == rhs)),
        };
    }

    let solution = model.solve()?;
    Ok(problem
        .variables
        .iter()
        .zip(&columns)
        .map(|(v, &column)| {
            let value = solution.value(column);
            match v.kind {
                VariableKind::Integer => value.round(),
                VariableKind::Continuous => value,
            }
        })
        .collect())
}

fn linear(coefficients: &[f64], columns: &[Column]) -> Expression {
    coefficients
        .iter()
        .zip(columns)
        .filter(|&(&c, _)| c != 0.0)
        .fold(Expression::from(0.0), |acc, (&c, &column)| acc + c * column)
}
