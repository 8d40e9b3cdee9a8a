use cutstock_solver::{ConstraintOp, LinearSolver, VariableKind};

use crate::error::{CutStockError, Result};
use crate::master::{build_allocation_model, violation_messages};
use crate::model::{PatternPool, Problem};

/// Distance from an integer below which a fractional unit count is rounded to it
const ROUNDING_TOLERANCE: f64 = 1e-6;

/// Integer number of material units cut with each pattern
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// `(pattern index, units)` for every pattern in use, in pool order
    pub units: Vec<(usize, u32)>,
    /// Whether no integer allocation over the same pool uses fewer units
    pub proven_optimal: bool,
}

impl Allocation {
    fn from_units(units: &[u32], proven_optimal: bool) -> Self {
        Self {
            units: units.iter().copied().enumerate().filter(|&(_, n)| n > 0).collect(),
            proven_optimal,
        }
    }

    /// Total material units consumed
    pub fn total_units(&self) -> u32 {
        self.units.iter().map(|&(_, n)| n).sum()
    }

    /// Pieces produced per part
    pub fn coverage(&self, problem: &Problem, pool: &PatternPool) -> Vec<u32> {
        let mut produced = vec![0; problem.num_parts()];
        for &(j, units) in &self.units {
            for (i, count) in pool[j].iter() {
                produced[i] += count * units;
            }
        }
        produced
    }
}

/// Solves the integer allocation restricted to the patterns in `pool`.
///
/// The continuous relaxation is rounded into a plan first. If that plan
/// already meets `ceil` of the relaxation bound it is optimal and the
/// integer model is skipped. Otherwise the backend solves the integer
/// model; should it fail, the rounded plan is kept with
/// `proven_optimal` unset.
pub fn solve_final<S: LinearSolver>(solver: &S, problem: &Problem, pool: &PatternPool) -> Result<Allocation> {
    let relaxed = solver.solve(&build_allocation_model(problem, pool, VariableKind::Continuous));
    if !relaxed.is_optimal() {
        return Err(CutStockError::FinalNotOptimal {
            status: relaxed.status,
            violations: violation_messages(&relaxed),
        });
    }

    let bound = (relaxed.objective_value - ROUNDING_TOLERANCE).ceil().max(0.0) as u32;
    let rounded = round_allocation(problem, pool, &relaxed.values);
    let rounded_total: u32 = rounded.iter().sum();
    if rounded_total <= bound {
        tracing::debug!("Rounded allocation of {} units meets the relaxation bound", rounded_total);
        return Ok(Allocation::from_units(&rounded, true));
    }

    let mut model = build_allocation_model(problem, pool, VariableKind::Integer);
    let ones = vec![1.0; pool.len()];
    model.add_constraint("units_at_least", ones.clone(), ConstraintOp::Ge, bound as f64);
    model.add_constraint("units_at_most", ones, ConstraintOp::Le, rounded_total as f64);

    let solution = solver.solve(&model);
    if solution.is_optimal() && solution.values.len() == pool.len() {
        let units: Vec<u32> = solution.values.iter().map(|&x| x.round().max(0.0) as u32).collect();
        if meets_demand(problem, pool, &units) && units.iter().sum::<u32>() <= rounded_total {
            return Ok(Allocation::from_units(&units, true));
        }
    }

    tracing::warn!(
        "Integer allocation is {}; keeping the rounded plan of {} units (relaxation bound {})",
        solution.status,
        rounded_total,
        bound
    );
    Ok(Allocation::from_units(&rounded, false))
}

fn produced(problem: &Problem, pool: &PatternPool, units: &[u32]) -> Vec<u32> {
    let mut produced = vec![0; problem.num_parts()];
    for (pattern, &n) in pool.iter().zip(units) {
        for (i, count) in pattern.iter() {
            produced[i] += count * n;
        }
    }
    produced
}

fn meets_demand(problem: &Problem, pool: &PatternPool, units: &[u32]) -> bool {
    produced(problem, pool, units)
        .iter()
        .zip(&problem.parts)
        .all(|(&n, part)| n >= part.demand)
}

/// Turns fractional units into a plan that meets demand, trying both
/// rounding directions and keeping the smaller result
fn round_allocation(problem: &Problem, pool: &PatternPool, values: &[f64]) -> Vec<u32> {
    let up = values.iter().map(|&x| (x - ROUNDING_TOLERANCE).ceil().max(0.0) as u32);
    let down = values.iter().map(|&x| (x + ROUNDING_TOLERANCE).floor().max(0.0) as u32);

    [up.collect::<Vec<u32>>(), down.collect()]
        .into_iter()
        .map(|mut units| {
            cover_shortfall(problem, pool, &mut units);
            drop_surplus(problem, pool, &mut units);
            units
        })
        .min_by_key(|units| units.iter().sum::<u32>())
        .unwrap_or_default()
}

/// Adds units of the pattern covering the most missing length until demand is met
fn cover_shortfall(problem: &Problem, pool: &PatternPool, units: &mut [u32]) {
    loop {
        let have = produced(problem, pool, units);
        let missing: Vec<u32> = problem
            .parts
            .iter()
            .zip(&have)
            .map(|(part, &n)| part.demand.saturating_sub(n))
            .collect();
        if missing.iter().all(|&n| n == 0) {
            return;
        }

        let best = pool
            .iter()
            .enumerate()
            .map(|(j, pattern)| {
                let gain: f64 = pattern
                    .iter()
                    .map(|(i, n)| n.min(missing[i]) as f64 * problem.parts[i].length)
                    .sum();
                (j, gain)
            })
            .filter(|&(_, gain)| gain > 0.0)
            .rev()
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((j, _)) => units[j] += 1,
            None => return,
        }
    }
}

/// Removes units that demand does not need, most wasteful patterns first
fn drop_surplus(problem: &Problem, pool: &PatternPool, units: &mut [u32]) {
    let mut have = produced(problem, pool, units);
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.sort_by(|&a, &b| pool[a].used_length(problem).total_cmp(&pool[b].used_length(problem)));

    for j in order {
        while units[j] > 0
            && pool[j]
                .iter()
                .all(|(i, n)| have[i] >= problem.parts[i].demand + n)
        {
            units[j] -= 1;
            for (i, n) in pool[j].iter() {
                have[i] -= n;
            }
        }
    }
}
