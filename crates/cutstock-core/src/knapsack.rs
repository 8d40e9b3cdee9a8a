//! Exact solver for the pricing knapsack.
//!
//! The copy bound `floor(capacity / length)` on each part is implied by the
//! capacity row, so pricing is an unbounded integer knapsack. When every
//! useful length is a whole number of some decimal unit, the capacity is
//! scanned by dynamic programming. Otherwise a depth-first search prunes
//! with the fractional relaxation, which for this problem is the best
//! value-per-length ratio times the remaining length.

use crate::model::Problem;

/// Kept below [`LENGTH_TOLERANCE`](crate::model::LENGTH_TOLERANCE) so that
/// every filling found here also passes `Pattern::fits`
const LENGTH_SLACK: f64 = 1e-10;

/// Largest scaled capacity scanned by dynamic programming
const MAX_SCAN_CAPACITY: usize = 1_000_000;

/// Decimal resolutions tried when turning lengths into whole units
const SCALES: [f64; 7] = [1.0, 10.0, 100.0, 1e3, 1e4, 1e5, 1e6];

/// Relative distance from a whole unit still counted as whole
const WHOLE_TOLERANCE: f64 = 1e-12;

/// Nodes the fallback search may visit before giving up
const MAX_SEARCH_NODES: usize = 20_000_000;

/// Value gain below which two fillings are considered tied
const VALUE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Item {
    part: usize,
    length: f64,
    value: f64,
}

/// Maximizes `Σ values[i] * x_i` subject to `Σ length_i * x_i <= capacity`.
///
/// Returns the count of every part, or `None` when the search budget runs
/// out before optimality is proven.
pub(crate) fn solve(problem: &Problem, values: &[f64]) -> Option<Vec<u32>> {
    let capacity = problem.material_length * (1.0 + LENGTH_SLACK);
    // Parts without positive value never improve a filling
    let items: Vec<Item> = problem
        .parts
        .iter()
        .enumerate()
        .filter(|&(i, p)| values[i] > 0.0 && p.length <= capacity)
        .map(|(i, p)| Item {
            part: i,
            length: p.length,
            value: values[i],
        })
        .collect();

    let mut counts = vec![0; problem.num_parts()];
    if items.is_empty() {
        return Some(counts);
    }

    let chosen = match whole_units(&items, capacity) {
        Some((weights, scaled)) => scan(&items, &weights, scaled),
        None => Search::new(items.clone(), capacity).run()?,
    };
    for (item, n) in items.iter().zip(chosen) {
        counts[item.part] = n;
    }
    Some(counts)
}

/// Integer weights and capacity at the coarsest resolution that keeps every
/// length whole
fn whole_units(items: &[Item], capacity: f64) -> Option<(Vec<usize>, usize)> {
    for scale in SCALES {
        let scaled_capacity = (capacity * scale).floor();
        if scaled_capacity > MAX_SCAN_CAPACITY as f64 {
            return None;
        }
        let weights: Option<Vec<usize>> = items
            .iter()
            .map(|item| {
                let scaled = item.length * scale;
                let whole = scaled.round();
                ((scaled - whole).abs() <= WHOLE_TOLERANCE * scaled && whole >= 1.0).then_some(whole as usize)
            })
            .collect();
        if let Some(weights) = weights {
            return Some((weights, scaled_capacity as usize));
        }
    }
    None
}

/// Dynamic program over the remaining capacity, `best[c]` being the most
/// value that fits in `c` units
fn scan(items: &[Item], weights: &[usize], capacity: usize) -> Vec<u32> {
    const LEFTOVER: u32 = u32::MAX;

    let mut best = vec![0.0; capacity + 1];
    let mut last = vec![LEFTOVER; capacity + 1];
    for c in 1..=capacity {
        best[c] = best[c - 1];
        for (k, (item, &w)) in items.iter().zip(weights).enumerate() {
            if w <= c && best[c - w] + item.value > best[c] + VALUE_TOLERANCE {
                best[c] = best[c - w] + item.value;
                last[c] = k as u32;
            }
        }
    }

    let mut chosen = vec![0; items.len()];
    let mut c = capacity;
    while c > 0 {
        match last[c] {
            LEFTOVER => c -= 1,
            k => {
                chosen[k as usize] += 1;
                c -= weights[k as usize];
            }
        }
    }
    chosen
}

/// Depth-first search over items in decreasing value per length
struct Search {
    items: Vec<Item>,
    /// Original position of each sorted item
    order: Vec<usize>,
    capacity: f64,
    counts: Vec<u32>,
    best: Vec<u32>,
    best_value: f64,
    nodes: usize,
}

impl Search {
    fn new(items: Vec<Item>, capacity: f64) -> Self {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = items[a].value / items[a].length;
            let rb = items[b].value / items[b].length;
            rb.total_cmp(&ra)
        });
        let sorted = order.iter().map(|&k| items[k]).collect();
        let n = items.len();
        Self {
            items: sorted,
            order,
            capacity,
            counts: vec![0; n],
            best: vec![0; n],
            best_value: 0.0,
            nodes: 0,
        }
    }

    fn run(mut self) -> Option<Vec<u32>> {
        if !self.descend(0, self.capacity, 0.0) {
            return None;
        }
        let mut chosen = vec![0; self.items.len()];
        for (sorted, &original) in self.order.iter().enumerate() {
            chosen[original] = self.best[sorted];
        }
        Some(chosen)
    }

    /// Returns `false` once the node budget is spent
    fn descend(&mut self, k: usize, remaining: f64, value: f64) -> bool {
        self.nodes += 1;
        if self.nodes > MAX_SEARCH_NODES {
            return false;
        }

        if value > self.best_value + VALUE_TOLERANCE {
            self.best_value = value;
            self.best.copy_from_slice(&self.counts);
        }
        let Some(item) = self.items.get(k).copied() else {
            return true;
        };
        let bound = value + remaining * item.value / item.length;
        if bound <= self.best_value + VALUE_TOLERANCE {
            return true;
        }

        let most = (remaining / item.length).floor() as u32;
        for n in (0..=most).rev() {
            self.counts[k] = n;
            let used = item.length * n as f64;
            if !self.descend(k + 1, remaining - used, value + item.value * n as f64) {
                return false;
            }
        }
        self.counts[k] = 0;
        true
    }
}
