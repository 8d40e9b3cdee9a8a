use crate::problem::LpProblem;
use crate::solution::Solution;

/// A numeric backend able to solve [`LpProblem`]s.
///
/// Callers read the outcome from [`Solution::status`]; values and dual
/// information are only meaningful when the status is optimal.
pub trait LinearSolver {
    fn solve(&self, problem: &LpProblem) -> Solution;
}

impl<S: LinearSolver + ?Sized> LinearSolver for &S {
    fn solve(&self, problem: &LpProblem) -> Solution {
        (**self).solve(problem)
    }
}

impl<S: LinearSolver + ?Sized> LinearSolver for Box<S> {
    fn solve(&self, problem: &LpProblem) -> Solution {
        (**self).solve(problem)
    }
}
