//! Column generation loop.
//!
//! The restricted master relaxation prices each part; the knapsack
//! subproblem turns those prices into the best new pattern. Generation stops
//! once no pattern has a reduced cost below `-epsilon`, and the integer
//! allocation is then solved over every pattern discovered.

use std::time::{Duration, Instant};

use cutstock_solver::{LinearSolver, MilpSolver};

use crate::allocation::{Allocation, solve_final};
use crate::error::{CutStockError, Result};
use crate::master::solve_relaxation;
use crate::model::{PatternPool, Problem};
use crate::pricing::{Pricing, PricingMethod, price, price_knapsack};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Reduced costs at or above `-epsilon` count as no improvement
    pub epsilon: f64,
    /// Pricing rounds allowed before giving up
    pub max_iterations: usize,
    pub pricing: PricingMethod,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            max_iterations: 1000,
            pricing: PricingMethod::default(),
        }
    }
}

impl GenerationConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingMethod) -> Self {
        self.pricing = pricing;
        self
    }
}

/// One master solve followed by one pricing round
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub relaxation_objective: f64,
    pub reduced_cost: f64,
    pub duals: Vec<f64>,
    /// Pool index of the pattern appended this round
    pub pattern: usize,
}

/// The outcome of a converged run
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct CuttingPlan {
    pub problem: Problem,
    pub pool: PatternPool,
    pub iterations: Vec<IterationRecord>,
    pub allocation: Allocation,
    /// Last relaxation objective, a lower bound on units for this pool
    pub relaxation_bound: Option<f64>,
    pub material_units: u32,
    /// Required length over purchased length; `None` when nothing is cut
    pub utilization: Option<f64>,
    pub elapsed: Duration,
}

impl CuttingPlan {
    /// Pieces produced per part
    pub fn coverage(&self) -> Vec<u32> {
        self.allocation.coverage(&self.problem, &self.pool)
    }

    /// Whether every part's demand is met
    pub fn meets_demand(&self) -> bool {
        self.coverage()
            .iter()
            .zip(&self.problem.parts)
            .all(|(&produced, part)| produced >= part.demand)
    }
}

pub struct ColumnGeneration<S = MilpSolver> {
    solver: S,
    config: GenerationConfig,
}

impl Default for ColumnGeneration<MilpSolver> {
    fn default() -> Self {
        Self::new(MilpSolver::new())
    }
}

impl<S: LinearSolver> ColumnGeneration<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Generates patterns until the relaxation is priced out, then solves
    /// the integer allocation over the resulting pool
    pub fn run(&self, problem: &Problem) -> Result<CuttingPlan> {
        self.run_with(problem, |_| {})
    }

    /// Like [`run`](Self::run), handing every iteration to `on_iteration`
    /// as soon as it completes, so the history survives a failed run
    pub fn run_with(&self, problem: &Problem, mut on_iteration: impl FnMut(&IterationRecord)) -> Result<CuttingPlan> {
        let start = Instant::now();
        tracing::info!(
            "Starting column generation: {} parts, material length {}",
            problem.num_parts(),
            problem.material_length
        );

        let mut pool = PatternPool::seeded(problem);
        let mut iterations = Vec::new();

        if problem.num_parts() > 0 {
            self.generate(problem, &mut pool, &mut iterations, &mut on_iteration)?;
        }

        let allocation = solve_final(&self.solver, problem, &pool).inspect_err(|e| {
            tracing::warn!("Final allocation failed: {}", e);
        })?;

        let material_units = allocation.total_units();
        let utilization = (material_units > 0)
            .then(|| problem.required_length() / (problem.material_length * material_units as f64));

        tracing::info!(
            "Column generation finished in {:?}: {} patterns, {} material units{}",
            start.elapsed(),
            pool.len(),
            material_units,
            if allocation.proven_optimal { "" } else { " (not proven optimal)" }
        );

        Ok(CuttingPlan {
            problem: problem.clone(),
            relaxation_bound: iterations.last().map(|r| r.relaxation_objective),
            pool,
            iterations,
            allocation,
            material_units,
            utilization,
            elapsed: start.elapsed(),
        })
    }

    fn generate(
        &self,
        problem: &Problem,
        pool: &mut PatternPool,
        iterations: &mut Vec<IterationRecord>,
        on_iteration: &mut impl FnMut(&IterationRecord),
    ) -> Result<()> {
        loop {
            if iterations.len() == self.config.max_iterations {
                tracing::warn!("No convergence after {} iterations", iterations.len());
                return Err(CutStockError::NotConverged {
                    iterations: iterations.len(),
                });
            }

            let relaxation = solve_relaxation(&self.solver, problem, pool).inspect_err(|e| {
                tracing::warn!("Master solve failed: {}", e);
            })?;
            let pricing = self.price(problem, &relaxation.duals).inspect_err(|e| {
                tracing::warn!("Pricing failed: {}", e);
            })?;

            tracing::debug!(
                "Iteration {}: relaxation {:.5}, reduced cost {:.5}, pattern {:?}",
                iterations.len() + 1,
                relaxation.objective,
                pricing.reduced_cost,
                pricing.pattern
            );

            let index = pool.push(pricing.pattern);
            let record = IterationRecord {
                relaxation_objective: relaxation.objective,
                reduced_cost: pricing.reduced_cost,
                duals: relaxation.duals,
                pattern: index,
            };
            on_iteration(&record);
            iterations.push(record);

            if pricing.reduced_cost >= -self.config.epsilon {
                return Ok(());
            }
        }
    }

    fn price(&self, problem: &Problem, duals: &[f64]) -> Result<Pricing> {
        match self.config.pricing {
            PricingMethod::Knapsack => price_knapsack(problem, duals),
            PricingMethod::Solver => price(&self.solver, problem, duals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Part;
    use cutstock_solver::{LpProblem, ShadowPrice, Solution, SolutionStatus};
    use std::cell::Cell;

    fn assert_plan_invariants(plan: &CuttingPlan) {
        for pattern in &plan.pool {
            assert!(pattern.fits(&plan.problem), "pattern {:?} does not fit", pattern);
        }
        assert!(plan.meets_demand(), "coverage {:?}", plan.coverage());
        assert_eq!(plan.pool.len(), plan.problem.num_parts() + plan.iterations.len());
    }

    /// Counts calls and forwards them to microlp
    struct CountingSolver {
        inner: Box<dyn LinearSolver>,
        calls: Cell<usize>,
    }

    impl LinearSolver for CountingSolver {
        fn solve(&self, problem: &LpProblem) -> Solution {
            self.calls.set(self.calls.get() + 1);
            self.inner.solve(problem)
        }
    }

    /// Solves the first `succeed` models, then stops making progress
    struct GiveUpAfter {
        succeed: usize,
        calls: Cell<usize>,
    }

    impl LinearSolver for GiveUpAfter {
        fn solve(&self, problem: &LpProblem) -> Solution {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() > self.succeed {
                Solution::iteration_limit()
            } else {
                MilpSolver::new().solve(problem)
            }
        }
    }

    /// Solves relaxations and gives up on every integer model
    struct RelaxationsOnly;

    impl LinearSolver for RelaxationsOnly {
        fn solve(&self, problem: &LpProblem) -> Solution {
            if problem.has_integer_variables() {
                Solution::iteration_limit()
            } else {
                MilpSolver::new().solve(problem)
            }
        }
    }

    /// Solves every model but reports the same duals for each relaxation
    struct FixedDuals(Vec<f64>);

    impl LinearSolver for FixedDuals {
        fn solve(&self, problem: &LpProblem) -> Solution {
            let mut solution = MilpSolver::new().solve(problem);
            if !problem.has_integer_variables() && solution.is_optimal() {
                solution.analysis.shadow_prices = problem
                    .constraints
                    .iter()
                    .zip(&self.0)
                    .map(|(c, &value)| ShadowPrice {
                        constraint: c.name.clone(),
                        value,
                    })
                    .collect();
            }
            solution
        }
    }

    #[test]
    fn test_two_parts() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        for it in &plan.iterations {
            println!("relax {:.5} reduced cost {:.5}", it.relaxation_objective, it.reduced_cost);
        }
        assert_plan_invariants(&plan);
        assert_eq!(plan.material_units, 2);
        assert!(plan.allocation.proven_optimal);
        let utilization = plan.utilization.unwrap();
        assert!((utilization - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_single_exact_part() {
        let problem = Problem::from_lists(10.0, &[10.0], &[5]);
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert_plan_invariants(&plan);
        assert_eq!(plan.material_units, 5);
        assert_eq!(plan.allocation.units.len(), 1);
        let (j, units) = plan.allocation.units[0];
        assert_eq!(plan.pool[j].iter().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(units, 5);
        assert_eq!(plan.utilization, Some(1.0));
    }

    #[test]
    fn test_part_longer_than_material() {
        let problem = Problem::from_lists(10.0, &[3.0, 12.0], &[2, 1]);
        let err = ColumnGeneration::default().run(&problem).unwrap_err();

        assert!(matches!(
            err,
            CutStockError::MasterNotOptimal {
                status: SolutionStatus::Infeasible,
                ..
            }
        ));
        println!("{}", err);
    }

    #[test]
    fn test_no_parts() {
        let problem = Problem::new(10.0, Vec::new());
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert!(plan.iterations.is_empty());
        assert!(plan.pool.is_empty());
        assert_eq!(plan.material_units, 0);
        assert_eq!(plan.utilization, None);
    }

    #[test]
    fn test_zero_demand() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[0, 0]);
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert_plan_invariants(&plan);
        assert_eq!(plan.iterations.len(), 1);
        assert_eq!(plan.material_units, 0);
        assert_eq!(plan.utilization, None);
    }

    #[test]
    fn test_classic_instance() {
        // Rod of 9 with the demand used in the column generation literature
        let lengths = [2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let demands = [4, 2, 6, 6, 2, 2, 2];
        let problem = Problem::from_lists(9.0, &lengths, &demands);

        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert_plan_invariants(&plan);
        let lower_bound = (problem.required_length() / problem.material_length).ceil() as u32;
        assert!(plan.material_units >= lower_bound);
        // Integer round-up property holds comfortably for this instance
        assert!(plan.material_units <= 14, "used {}", plan.material_units);
        let utilization = plan.utilization.unwrap();
        assert!(utilization > 0.0 && utilization <= 1.0);
    }

    #[test]
    fn test_fractional_lengths() {
        let problem = Problem::new(
            12.5,
            vec![
                Part { length: 3.5, demand: 10 },
                Part { length: 4.0, demand: 5 },
                Part { length: 5.0, demand: 8 },
            ],
        );
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert_plan_invariants(&plan);
        assert!(plan.utilization.unwrap() <= 1.0);
    }

    #[test]
    fn test_many_parts_converges() {
        // 36 parts with two-decimal lengths from 3.65 to 146.1
        let lengths: Vec<f64> = (0..36).map(|i| 3.65 + i as f64 * 4.07).collect();
        let demands: Vec<u32> = (0..36).map(|i| 1 + (i * 13) % 50).collect();
        let problem = Problem::from_lists(1000.0, &lengths, &demands);

        let plan = ColumnGeneration::new(RelaxationsOnly).run(&problem).unwrap();

        assert_plan_invariants(&plan);
        let last = plan.iterations.last().unwrap();
        assert!(last.reduced_cost >= -GenerationConfig::default().epsilon);
        let lower_bound = (problem.required_length() / problem.material_length).ceil() as u32;
        assert!(plan.material_units >= lower_bound);
        assert!(plan.utilization.unwrap() <= 1.0);
    }

    #[test]
    fn test_iteration_cap() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let generation = ColumnGeneration::default().with_config(GenerationConfig::default().with_max_iterations(0));

        let err = generation.run(&problem).unwrap_err();

        assert_eq!(err, CutStockError::NotConverged { iterations: 0 });
    }

    #[test]
    fn test_reduced_cost_at_epsilon_stops() {
        // Duals 0.25 and 0.75 price two 4s at 1.5, a reduced cost of exactly -0.5
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let config = GenerationConfig::default().with_epsilon(0.5);

        let plan = ColumnGeneration::new(FixedDuals(vec![0.25, 0.75]))
            .with_config(config)
            .run(&problem)
            .unwrap();

        assert_eq!(plan.iterations.len(), 1);
        assert_eq!(plan.iterations[0].reduced_cost, -0.5);
        assert_eq!(plan.pool[plan.iterations[0].pattern], crate::model::Pattern::single(1, 2));
    }

    #[test]
    fn test_reduced_cost_below_epsilon_continues() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let config = GenerationConfig::default().with_epsilon(0.4999).with_max_iterations(3);

        let mut seen = Vec::new();
        let err = ColumnGeneration::new(FixedDuals(vec![0.25, 0.75]))
            .with_config(config)
            .run_with(&problem, |record| seen.push(record.reduced_cost))
            .unwrap_err();

        assert_eq!(err, CutStockError::NotConverged { iterations: 3 });
        // The history is still delivered when the run fails
        assert_eq!(seen, vec![-0.5; 3]);
    }

    #[test]
    fn test_pricing_failure_halts() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let config = GenerationConfig::default().with_pricing(PricingMethod::Solver);

        let err = ColumnGeneration::new(RelaxationsOnly)
            .with_config(config)
            .run(&problem)
            .unwrap_err();

        assert_eq!(
            err,
            CutStockError::PricingNotOptimal {
                status: SolutionStatus::IterationLimit
            }
        );
    }

    #[test]
    fn test_final_failure_halts() {
        // One master solve converges; the final relaxation is the second call
        let problem = Problem::from_lists(10.0, &[10.0], &[5]);
        let solver = GiveUpAfter {
            succeed: 1,
            calls: Cell::new(0),
        };

        let mut seen = 0;
        let err = ColumnGeneration::new(&solver)
            .run_with(&problem, |_| seen += 1)
            .unwrap_err();

        assert!(matches!(
            err,
            CutStockError::FinalNotOptimal {
                status: SolutionStatus::IterationLimit,
                ..
            }
        ));
        assert_eq!(seen, 1);
        assert_eq!(solver.calls.get(), 2);
    }

    #[test]
    fn test_custom_backend() {
        let solver = CountingSolver {
            inner: Box::new(MilpSolver::new()),
            calls: Cell::new(0),
        };
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[4, 2]);
        let config = GenerationConfig::default().with_pricing(PricingMethod::Solver);

        let plan = ColumnGeneration::new(&solver).with_config(config).run(&problem).unwrap();

        assert_plan_invariants(&plan);
        // A master and a pricing solve per iteration, then one or two final solves
        let final_calls = solver.calls.get() - 2 * plan.iterations.len();
        assert!((1..=2).contains(&final_calls), "{} final calls", final_calls);
        assert_eq!(plan.material_units, 2);
    }

    #[test]
    fn test_relaxation_is_monotone() {
        let problem = Problem::from_lists(100.0, &[45.0, 36.0, 31.0, 14.0], &[97, 610, 395, 211]);
        let plan = ColumnGeneration::default().run(&problem).unwrap();

        assert_plan_invariants(&plan);
        for pair in plan.iterations.windows(2) {
            assert!(pair[1].relaxation_objective <= pair[0].relaxation_objective + 1e-7);
        }
        let last = plan.iterations.last().unwrap();
        assert!(last.reduced_cost >= -GenerationConfig::default().epsilon);
    }
}
