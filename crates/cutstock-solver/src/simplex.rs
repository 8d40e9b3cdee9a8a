use crate::backend::LinearSolver;
use crate::problem::{Constraint, ConstraintOp, LpProblem};
use crate::solution::{Analysis, ConstraintViolation, ShadowPrice, Solution, SolutionStatus};

/// Consecutive degenerate pivots tolerated before switching to Bland's rule
const DEGENERATE_STREAK: usize = 50;

/// Residual artificial mass above which phase 1 reports infeasibility
const FEASIBILITY_TOLERANCE: f64 = 1e-7;

/// Simplex solver for linear programming problems.
///
/// Integrality markers on variables are ignored; [`MilpSolver`](crate::MilpSolver)
/// routes integer models elsewhere.
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots per phase before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 50_000,
            tolerance: 1e-9,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Solve the LP relaxation of `problem` using the two-phase simplex method
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        let rows = standard_rows(problem, &problem.constraints);
        let solution = self.solve_rows(problem, &rows);

        if solution.status == SolutionStatus::Infeasible {
            return self.diagnose_infeasibility(problem);
        }
        solution
    }

    /// Solve without infeasibility recovery
    fn solve_rows(&self, problem: &LpProblem, rows: &[Constraint]) -> Solution {
        let mut tableau = self.build_tableau(problem, rows);

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                SimplexResult::Optimal => {}
                SimplexResult::Unbounded | SimplexResult::Infeasible => return Solution::infeasible(),
                SimplexResult::IterationLimit => return Solution::iteration_limit(),
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau) {
            SimplexResult::Optimal => self.extract_solution(&tableau, problem),
            SimplexResult::Unbounded => Solution::unbounded(),
            SimplexResult::Infeasible => Solution::infeasible(),
            SimplexResult::IterationLimit => Solution::iteration_limit(),
        }
    }

    /// Re-solve with the `>=` rows dropped and report which of them the
    /// remaining model cannot reach
    fn diagnose_infeasibility(&self, problem: &LpProblem) -> Solution {
        let mut relaxed_problem = problem.clone();
        relaxed_problem.constraints.retain(|c| c.op != ConstraintOp::Ge);
        let rows = standard_rows(&relaxed_problem, &relaxed_problem.constraints);
        let relaxed = self.solve_rows(&relaxed_problem, &rows);

        if relaxed.status != SolutionStatus::Optimal {
            return Solution::infeasible();
        }

        let violations = self.find_violations(problem, &relaxed.values);
        Solution::infeasible_with_violations(violations)
    }

    /// Find which constraints are violated by a given solution
    fn find_violations(&self, problem: &LpProblem, values: &[f64]) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &problem.constraints {
            let lhs: f64 = c.coefficients.iter().zip(values).map(|(a, x)| a * x).sum();

            let violation = match c.op {
                ConstraintOp::Le if lhs > c.rhs + FEASIBILITY_TOLERANCE => {
                    let amt = lhs - c.rhs;
                    Some((amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Ge if lhs < c.rhs - FEASIBILITY_TOLERANCE => {
                    let amt = c.rhs - lhs;
                    Some((amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Eq if (lhs - c.rhs).abs() > FEASIBILITY_TOLERANCE => {
                    let amt = (lhs - c.rhs).abs();
                    Some((amt, format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs)))
                }
                _ => None,
            };

            if let Some((violation_amount, description)) = violation {
                violations.push(ConstraintViolation {
                    constraint: c.name.clone(),
                    required: c.rhs,
                    actual: lhs,
                    violation_amount,
                    description,
                });
            }
        }

        // Worst first
        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));

        violations
    }

    fn build_tableau(&self, problem: &LpProblem, rows: &[Constraint]) -> Tableau {
        let n_vars = problem.num_variables();
        let n_constraints = rows.len();

        // Rows with a negative RHS are negated, which turns <= into >= and back.
        // `>= 0` rows are negated too so their slack starts in the basis.
        let normalized: Vec<(ConstraintOp, bool)> = rows
            .iter()
            .map(|c| {
                if c.rhs < 0.0 || (c.rhs == 0.0 && c.op == ConstraintOp::Ge) {
                    let op = match c.op {
                        ConstraintOp::Le => ConstraintOp::Ge,
                        ConstraintOp::Ge => ConstraintOp::Le,
                        ConstraintOp::Eq => ConstraintOp::Eq,
                    };
                    (op, true)
                } else {
                    (c.op, false)
                }
            })
            .collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;
        for (op, _) in &normalized {
            match op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
            dual_cols: Vec::with_capacity(n_constraints),
            flipped: Vec::with_capacity(n_constraints),
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (c, &(op, flip))) in rows.iter().zip(&normalized).enumerate() {
            let sign = if flip { -1.0 } else { 1.0 };
            for (j, &coef) in c.coefficients.iter().enumerate().take(n_vars) {
                tableau.data[i][j] = sign * coef;
            }
            tableau.data[i][total_cols - 1] = (sign * c.rhs).abs();

            match op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    tableau.dual_cols.push((slack_idx, 1.0));
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    tableau.dual_cols.push((slack_idx, -1.0));
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    tableau.dual_cols.push((artificial_idx, 1.0));
                    artificial_idx += 1;
                }
            }
            tableau.flipped.push(flip);
        }

        // Objective row (last row). The tableau maximizes, so a minimization
        // stores -c; positive entries are improving directions.
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.coefficients.iter().enumerate().take(n_vars) {
            tableau.data[obj_row][j] = if problem.objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau) -> SimplexResult {
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();
        let art_start = tableau.art_start();

        let orig_obj = tableau.data[obj_row].clone();

        // Maximize -sum(artificials)
        tableau.data[obj_row].iter_mut().for_each(|v| *v = 0.0);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[obj_row][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] += tableau.data[i][j];
                }
            }
        }

        match self.optimize(tableau, n_cols - 1) {
            SimplexResult::Optimal => {}
            other => return other,
        }

        let rhs_col = n_cols - 1;
        let residual: f64 = (0..obj_row)
            .filter(|&i| tableau.basic_vars[i] >= art_start)
            .map(|i| tableau.data[i][rhs_col].abs())
            .sum();
        if residual > FEASIBILITY_TOLERANCE {
            return SimplexResult::Infeasible;
        }

        self.drive_out_artificials(tableau);

        // Restore original objective and price out the basis
        tableau.data[obj_row] = orig_obj;
        for i in 0..obj_row {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[obj_row][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    /// Artificials left in the basis at zero level are pivoted out so phase 2
    /// cannot raise them again. A row with no structural entry is redundant
    /// and keeps its artificial.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.art_start();
        for i in 0..tableau.obj_row() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let replacement = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            if let Some(col) = replacement {
                self.pivot(tableau, i, col);
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau) -> SimplexResult {
        // Artificial columns never re-enter
        let limit = tableau.art_start();
        self.optimize(tableau, limit)
    }

    /// Pivot until no column below `limit` improves the objective row
    fn optimize(&self, tableau: &mut Tableau, limit: usize) -> SimplexResult {
        let rhs_col = tableau.n_cols() - 1;
        let mut degenerate = 0;

        for _ in 0..self.max_iterations {
            let bland = degenerate >= DEGENERATE_STREAK;
            let Some(pivot_col) = self.find_pivot_column(tableau, limit, bland) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col, bland) else {
                return SimplexResult::Unbounded;
            };

            if tableau.data[pivot_row][rhs_col].abs() <= self.tolerance {
                degenerate += 1;
            } else {
                degenerate = 0;
            }
            self.pivot(tableau, pivot_row, pivot_col);
        }
        SimplexResult::IterationLimit
    }

    fn find_pivot_column(&self, tableau: &Tableau, limit: usize, bland: bool) -> Option<usize> {
        let obj = &tableau.data[tableau.obj_row()];

        if bland {
            return (0..limit).find(|&j| obj[j] > self.tolerance);
        }

        // Most positive reduced cost
        let mut max_val = self.tolerance;
        let mut max_col = None;
        for (j, &val) in obj.iter().enumerate().take(limit) {
            if val > max_val {
                max_val = val;
                max_col = Some(j);
            }
        }
        max_col
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<usize> {
        let rhs_col = tableau.n_cols() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(r) if (ratio - min_ratio).abs() <= self.tolerance => {
                    // Bland breaks ties on the smallest leaving variable
                    bland && tableau.basic_vars[i] < tableau.basic_vars[r]
                }
                Some(_) => ratio < min_ratio,
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.n_cols();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        let pivot_row = tableau.data[row].clone();
        for i in 0..n_rows {
            if i == row {
                continue;
            }
            let factor = tableau.data[i][col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in tableau.data[i].iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
                if cell.abs() < 1e-12 {
                    *cell = 0.0;
                }
            }
        }
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.n_cols() - 1;

        let mut values = vec![0.0; n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < n_vars {
                values[basic] = tableau.data[i][rhs_col].max(0.0);
            }
        }

        let objective_value = problem.evaluate(&values);
        let analysis = self.analyze(tableau, problem);

        Solution {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            analysis,
            violations: Vec::new(),
        }
    }

    fn analyze(&self, tableau: &Tableau, problem: &LpProblem) -> Analysis {
        let obj = &tableau.data[tableau.obj_row()];
        let minimize = problem.objective.minimize;

        // Only user constraints carry shadow prices; bound rows follow them
        let shadow_prices = problem
            .constraints
            .iter()
            .enumerate()
            .map(|(i, constraint)| {
                let (col, sign) = tableau.dual_cols[i];
                let mut value = -obj[col] / sign;
                if tableau.flipped[i] {
                    value = -value;
                }
                if minimize {
                    value = -value;
                }
                if value.abs() < self.tolerance {
                    value = 0.0;
                }
                ShadowPrice {
                    constraint: constraint.name.clone(),
                    value,
                }
            })
            .collect();

        Analysis { shadow_prices }
    }
}

impl LinearSolver for Solver {
    fn solve(&self, problem: &LpProblem) -> Solution {
        Solver::solve(self, problem)
    }
}

/// User rows followed by one row per finite upper bound and positive lower bound
fn standard_rows(problem: &LpProblem, constraints: &[Constraint]) -> Vec<Constraint> {
    let n = problem.num_variables();
    let mut rows = constraints.to_vec();

    for (j, var) in problem.variables.iter().enumerate() {
        let mut unit = vec![0.0; n];
        unit[j] = 1.0;
        if var.upper.is_finite() {
            rows.push(Constraint {
                name: format!("{}_ub", var.name),
                coefficients: unit.clone(),
                op: ConstraintOp::Le,
                rhs: var.upper,
            });
        }
        if var.lower > 0.0 {
            rows.push(Constraint {
                name: format!("{}_lb", var.name),
                coefficients: unit,
                op: ConstraintOp::Ge,
                rhs: var.lower,
            });
        }
    }

    rows
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    /// Column and its coefficient in the row, used to read the row's dual
    dual_cols: Vec<(usize, f64)>,
    /// Whether the row was negated to make its RHS non-negative
    flipped: Vec<bool>,
}

impl Tableau {
    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}
