use std::collections::BTreeMap;
use std::fmt;

/// Relative slack on the material length for accumulated rounding in part lengths
pub const LENGTH_TOLERANCE: f64 = 1e-9;

/// One required part type
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Part {
    pub length: f64,
    pub demand: u32,
}

/// A cutting-stock instance: the material length and the parts to cut from it
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub material_length: f64,
    pub parts: Vec<Part>,
}

impl Problem {
    pub fn new(material_length: f64, parts: Vec<Part>) -> Self {
        Self { material_length, parts }
    }

    /// Builds a problem from parallel length and demand lists
    pub fn from_lists(material_length: f64, lengths: &[f64], demands: &[u32]) -> Self {
        let parts = lengths
            .iter()
            .zip(demands)
            .map(|(&length, &demand)| Part { length, demand })
            .collect();
        Self::new(material_length, parts)
    }

    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Usable length of one unit of material, [`LENGTH_TOLERANCE`] included
    pub fn capacity(&self) -> f64 {
        self.material_length * (1.0 + LENGTH_TOLERANCE)
    }

    /// How many copies of part `i` fit in one unit of material
    pub fn max_copies(&self, i: usize) -> u32 {
        (self.capacity() / self.parts[i].length).floor() as u32
    }

    /// Total length of all demanded parts
    pub fn required_length(&self) -> f64 {
        self.parts.iter().map(|p| p.length * p.demand as f64).sum()
    }
}

/// How many of each part are cut from one unit of material.
///
/// Keyed by part index; iteration is in part order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    counts: BTreeMap<usize, u32>,
}

impl Pattern {
    /// A pattern cutting `count` copies of a single part
    pub fn single(part: usize, count: u32) -> Self {
        Self {
            counts: BTreeMap::from([(part, count)]),
        }
    }

    /// Builds a pattern from `(part, count)` pairs, dropping zero counts
    pub fn from_counts(counts: impl IntoIterator<Item = (usize, u32)>) -> Self {
        Self {
            counts: counts.into_iter().filter(|&(_, n)| n > 0).collect(),
        }
    }

    pub fn count(&self, part: usize) -> u32 {
        self.counts.get(&part).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.counts.iter().map(|(&i, &n)| (i, n))
    }

    /// Material consumed by one cut of this pattern
    pub fn used_length(&self, problem: &Problem) -> f64 {
        self.iter()
            .map(|(i, n)| problem.parts[i].length * n as f64)
            .sum()
    }

    /// Whether the pattern fits in one unit of material
    pub fn fits(&self, problem: &Problem) -> bool {
        self.used_length(problem) <= problem.capacity()
    }

    pub fn display<'a>(&'a self, problem: &'a Problem) -> PatternDisplay<'a> {
        PatternDisplay { pattern: self, problem }
    }
}

/// Formats as `length*count` pairs, e.g. `3*2 4*1`
pub struct PatternDisplay<'a> {
    pattern: &'a Pattern,
    problem: &'a Problem,
}

impl fmt::Display for PatternDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (i, n) in self.pattern.iter().filter(|&(_, n)| n > 0) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}*{}", self.problem.parts[i].length, n)?;
            first = false;
        }
        Ok(())
    }
}

/// Append-only collection of patterns. A pattern's position is its
/// variable index in the allocation models.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternPool {
    patterns: Vec<Pattern>,
}

impl PatternPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// One trivial pattern per part, repeating that part as often as it fits.
    /// A part longer than the material gets a zero-count pattern.
    pub fn seeded(problem: &Problem) -> Self {
        let patterns = (0..problem.num_parts())
            .map(|i| Pattern::single(i, problem.max_copies(i)))
            .collect();
        Self { patterns }
    }

    /// Appends a pattern and returns its index
    pub fn push(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        self.patterns.len() - 1
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }
}

impl std::ops::Index<usize> for PatternPool {
    type Output = Pattern;

    fn index(&self, index: usize) -> &Pattern {
        &self.patterns[index]
    }
}

impl<'a> IntoIterator for &'a PatternPool {
    type Item = &'a Pattern;
    type IntoIter = std::slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_pool() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0, 12.0], &[2, 2, 1]);
        let pool = PatternPool::seeded(&problem);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0], Pattern::single(0, 3));
        assert_eq!(pool[1], Pattern::single(1, 2));
        // Too long to fit: zero copies
        assert_eq!(pool[2].count(2), 0);
        assert!(pool.iter().all(|p| p.fits(&problem)));
    }

    #[test]
    fn test_pattern_length_and_display() {
        let problem = Problem::from_lists(10.0, &[3.0, 4.0], &[2, 2]);
        let pattern = Pattern::from_counts([(0, 2), (1, 1)]);

        assert_eq!(pattern.used_length(&problem), 10.0);
        assert!(pattern.fits(&problem));
        assert_eq!(pattern.display(&problem).to_string(), "3*2 4*1");

        let overfull = Pattern::from_counts([(0, 2), (1, 2)]);
        assert!(!overfull.fits(&problem));
    }

    #[test]
    fn test_from_counts_drops_zeros() {
        let pattern = Pattern::from_counts([(0, 0), (1, 3), (2, 0)]);

        assert_eq!(pattern.iter().collect::<Vec<_>>(), vec![(1, 3)]);
        assert_eq!(pattern.count(0), 0);
    }

    #[test]
    fn test_required_length() {
        let problem = Problem::from_lists(10.0, &[3.5, 4.0], &[2, 3]);

        assert_eq!(problem.required_length(), 19.0);
        assert_eq!(problem.max_copies(0), 2);
    }

    #[test]
    fn test_copy_bound_agrees_with_fits() {
        // 7 * 0.1 is slightly above 0.7 in floating point
        let problem = Problem::from_lists(0.7, &[0.1], &[7]);

        assert_eq!(problem.max_copies(0), 7);
        assert!(Pattern::single(0, 7).fits(&problem));
        assert!(!Pattern::single(0, 8).fits(&problem));

        let problem = Problem::from_lists(10.0, &[3.0], &[1]);
        assert_eq!(problem.max_copies(0), 3);
        assert!(!Pattern::single(0, 4).fits(&problem));
    }
}
