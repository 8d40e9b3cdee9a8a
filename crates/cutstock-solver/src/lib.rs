mod backend;
mod milp;
mod problem;
mod simplex;
mod solution;

pub use backend::LinearSolver;
pub use milp::MilpSolver;
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective, Variable, VariableKind};
pub use simplex::Solver;
pub use solution::{Analysis, ConstraintViolation, ShadowPrice, Solution, SolutionStatus};
