use std::fmt::Write as _;

/// Represents a linear (or mixed-integer) programming problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct LpProblem {
    /// Decision variables, indexed by insertion order
    pub variables: Vec<Variable>,
    /// Objective function coefficients
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Lower bound, finite and non-negative
    pub lower: f64,
    /// Upper bound, may be `f64::INFINITY`
    pub upper: f64,
    pub kind: VariableKind,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Continuous,
    Integer,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

impl Default for Objective {
    fn default() -> Self {
        Self {
            coefficients: Vec::new(),
            minimize: true,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    fn symbol(self) -> &'static str {
        match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        }
    }
}

impl LpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable and returns its column index.
    ///
    /// Objective and constraint coefficient vectors added earlier are padded
    /// with zeros so every row keeps one entry per variable.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64, kind: VariableKind) -> usize {
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
            kind,
        });
        let n = self.variables.len();
        self.objective.coefficients.resize(n, 0.0);
        for c in &mut self.constraints {
            c.coefficients.resize(n, 0.0);
        }
        n - 1
    }

    pub fn set_objective(&mut self, mut coefficients: Vec<f64>, minimize: bool) {
        coefficients.resize(self.variables.len(), 0.0);
        self.objective = Objective { coefficients, minimize };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, mut coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        coefficients.resize(self.variables.len(), 0.0);
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integer_variables(&self) -> bool {
        self.variables.iter().any(|v| v.kind == VariableKind::Integer)
    }

    /// Objective value of `values` under this problem's objective
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Renders the model in CPLEX LP format
    pub fn to_lp_format(&self) -> String {
        let mut out = String::new();
        let names: Vec<String> = self.variables.iter().map(|v| lp_identifier(&v.name)).collect();

        out.push_str(if self.objective.minimize { "Minimize\n" } else { "Maximize\n" });
        let _ = writeln!(out, " obj: {}", linear_expr(&self.objective.coefficients, &names));

        out.push_str("Subject To\n");
        for c in &self.constraints {
            let _ = writeln!(
                out,
                " {}: {} {} {}",
                lp_identifier(&c.name),
                linear_expr(&c.coefficients, &names),
                c.op.symbol(),
                c.rhs
            );
        }

        out.push_str("Bounds\n");
        for (v, name) in self.variables.iter().zip(&names) {
            if v.upper.is_finite() {
                let _ = writeln!(out, " {} <= {} <= {}", v.lower, name, v.upper);
            } else {
                let _ = writeln!(out, " {} >= {}", name, v.lower);
            }
        }

        if self.has_integer_variables() {
            out.push_str("General\n");
            for (v, name) in self.variables.iter().zip(&names) {
                if v.kind == VariableKind::Integer {
                    let _ = writeln!(out, " {}", name);
                }
            }
        }

        out.push_str("End\n");
        out
    }
}

fn linear_expr(coefficients: &[f64], names: &[String]) -> String {
    let mut expr = String::new();
    for (coef, name) in coefficients.iter().zip(names) {
        if *coef == 0.0 {
            continue;
        }
        if expr.is_empty() {
            if *coef < 0.0 {
                expr.push_str("- ");
            }
        } else if *coef < 0.0 {
            expr.push_str(" - ");
        } else {
            expr.push_str(" + ");
        }
        let _ = write!(expr, "{} {}", coef.abs(), name);
    }
    if expr.is_empty() {
        // LP format rejects empty expressions
        match names.first() {
            Some(name) => expr = format!("0 {}", name),
            None => expr.push('0'),
        }
    }
    expr
}

/// LP format identifiers may not contain brackets, spaces or operators
fn lp_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
