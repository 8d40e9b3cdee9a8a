pub mod allocation;
pub mod error;
pub mod generation;
mod knapsack;
pub mod master;
pub mod model;
pub mod parser;
pub mod pricing;

pub use allocation::{Allocation, solve_final};
pub use error::{CutStockError, Result};
pub use generation::{ColumnGeneration, CuttingPlan, GenerationConfig, IterationRecord};
pub use master::{Relaxation, build_allocation_model, solve_relaxation};
pub use model::{Part, Pattern, PatternPool, Problem};
pub use parser::{ParseError, Parser};
pub use pricing::{Pricing, PricingMethod, build_knapsack_model, price, price_knapsack};
