use std::fmt;

/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Dual information (empty unless optimal and solved by the simplex)
    pub analysis: Analysis,
    /// Constraint violations (populated when infeasible)
    pub violations: Vec<ConstraintViolation>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The solver gave up before optimality was proven
    IterationLimit,
    /// The backend reported an error unrelated to the model's feasibility
    Failed,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
            SolutionStatus::IterationLimit => "iteration limit reached",
            SolutionStatus::Failed => "not solved",
        };
        f.write_str(s)
    }
}

/// Dual analysis of the optimal solution
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Shadow prices (dual values) for each constraint, in constraint order.
    /// The value is the change in objective per unit increase of the RHS.
    pub shadow_prices: Vec<ShadowPrice>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    /// Shadow price value
    pub value: f64,
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual value achieved
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            values,
            ..Self::with_status(SolutionStatus::Optimal, objective_value)
        }
    }

    pub fn infeasible() -> Self {
        Self::with_status(SolutionStatus::Infeasible, f64::INFINITY)
    }

    pub fn infeasible_with_violations(violations: Vec<ConstraintViolation>) -> Self {
        Self {
            violations,
            ..Self::infeasible()
        }
    }

    pub fn unbounded() -> Self {
        Self::with_status(SolutionStatus::Unbounded, f64::NEG_INFINITY)
    }

    pub fn iteration_limit() -> Self {
        Self::with_status(SolutionStatus::IterationLimit, f64::NAN)
    }

    pub fn failed() -> Self {
        Self::with_status(SolutionStatus::Failed, f64::NAN)
    }

    fn with_status(status: SolutionStatus, objective_value: f64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value,
            analysis: Analysis::default(),
            violations: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Dual values in constraint order
    pub fn duals(&self) -> Vec<f64> {
        self.analysis.shadow_prices.iter().map(|sp| sp.value).collect()
    }
}
