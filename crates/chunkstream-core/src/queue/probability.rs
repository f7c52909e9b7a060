//! Cumulative selection probabilities over priority levels.
//!
//! Level `i` has weight `2^-i`; the map stores the normalized cumulative
//! weight through each level, so level 0 gets roughly twice the selection
//! mass of level 1, and so on.

/// Monotonically increasing cumulative distribution, last entry exactly 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    cumulative: Vec<f64>,
}

impl ProbabilityMap {
    /// Build the geometric map for `levels` tiers. `levels` must be at least 1.
    pub fn geometric(levels: usize) -> Self {
        let weights: Vec<f64> = (0..levels).map(|i| 0.5f64.powi(i as i32)).collect();
        let total: f64 = weights.iter().sum();

        let mut cumulative = Vec::with_capacity(levels);
        let mut acc = 0.0;
        for w in &weights {
            acc += w / total;
            cumulative.push(acc);
        }
        // Rounding can leave the tail a hair below 1.0.
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }
        Self { cumulative }
    }

    pub fn levels(&self) -> usize {
        self.cumulative.len()
    }

    /// Cumulative probability through `level` (inclusive).
    pub fn cumulative(&self, level: usize) -> f64 {
        self.cumulative.get(level).copied().unwrap_or(1.0)
    }

    /// Cumulative mass of all levels strictly above `level` (0.0 for level 0).
    pub fn mass_before(&self, level: usize) -> f64 {
        match level {
            0 => 0.0,
            l => self.cumulative(l - 1),
        }
    }

    /// Smallest level whose cumulative probability exceeds `seed`.
    pub fn level_for(&self, seed: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&p| seed < p)
            .unwrap_or(self.cumulative.len().saturating_sub(1))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.cumulative
    }
}
