use cutstock_solver::SolutionStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CutStockError {
    #[error("Restricted master problem is {status}{}", describe_violations(.violations))]
    MasterNotOptimal {
        status: SolutionStatus,
        violations: Vec<String>,
    },
    #[error("Pricing subproblem is {status}")]
    PricingNotOptimal { status: SolutionStatus },
    #[error("Final allocation problem is {status}{}", describe_violations(.violations))]
    FinalNotOptimal {
        status: SolutionStatus,
        violations: Vec<String>,
    },
    #[error("Priced pattern uses {used} but the material length is {capacity}")]
    PatternOverflow { used: f64, capacity: f64 },
    #[error("Column generation did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
}

fn describe_violations(violations: &[String]) -> String {
    if violations.is_empty() {
        String::new()
    } else {
        format!(": {}", violations.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, CutStockError>;
