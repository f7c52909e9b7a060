//! Multi-level priority scheduler with probabilistic starvation avoidance.
//!
//! Keys live in one `LevelQueue` per priority level (0 = highest). `pop`
//! draws a random seed against the geometric `ProbabilityMap` so that lower
//! levels are still served every now and then while higher levels keep
//! receiving work.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;

use super::level::LevelQueue;
use super::probability::ProbabilityMap;

/// Priority queue made of N FIFO levels and a selection distribution.
///
/// Invariant: a key is held by at most one level at a time.
#[derive(Debug)]
pub struct PriorityScheduler {
    levels: Vec<LevelQueue>,
    probabilities: ProbabilityMap,
    rng: StdRng,
}

impl PriorityScheduler {
    /// Create a scheduler with `levels` tiers, seeded from the OS.
    pub fn new(levels: usize) -> Result<Self, ConfigError> {
        Self::with_rng(levels, StdRng::from_os_rng())
    }

    /// Create a scheduler whose level selection is reproducible.
    pub fn with_seed(levels: usize, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(levels, StdRng::seed_from_u64(seed))
    }

    fn with_rng(levels: usize, rng: StdRng) -> Result<Self, ConfigError> {
        if levels == 0 {
            return Err(ConfigError::ZeroPriorityLevels);
        }
        let probabilities = ProbabilityMap::geometric(levels);
        tracing::debug!(levels, map = ?probabilities.as_slice(), "priority scheduler created");
        Ok(Self {
            levels: (0..levels).map(|_| LevelQueue::new()).collect(),
            probabilities,
            rng,
        })
    }

    /// Number of priority levels.
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    pub fn probability_map(&self) -> &ProbabilityMap {
        &self.probabilities
    }

    /// Level currently holding `key`, scanning from the highest priority.
    pub fn get_priority(&self, key: &str) -> Option<usize> {
        self.levels.iter().position(|q| q.has(key))
    }

    /// Membership test within one level, or across all levels when `level` is `None`.
    /// A level outside the configured range never holds anything.
    pub fn has(&self, key: &str, level: Option<usize>) -> bool {
        match level {
            Some(l) => self.levels.get(l).is_some_and(|q| q.has(key)),
            None => self.get_priority(key).is_some(),
        }
    }

    /// Queue `key` at `level`.
    ///
    /// No-op when the key is already held at an equal or better (lower) level;
    /// when it is held at a worse level it moves to the back of `level`.
    /// Returns true if the key was inserted or moved.
    pub fn add(&mut self, key: &str, level: usize) -> bool {
        let level = self.clamp_level(level);
        match self.get_priority(key) {
            Some(existing) if existing <= level => return false,
            Some(existing) => {
                self.levels[existing].remove(key);
            }
            None => {}
        }
        self.levels[level].add(key)
    }

    /// Pop one key, choosing the level at random against the probability map.
    ///
    /// The seed is padded past the leading run of empty levels, so it always
    /// lands at or below the first non-empty level. If the drawn level is
    /// itself empty, the nearest non-empty level above it is used instead.
    /// Returns `None` without touching any state when every level is empty.
    pub fn pop(&mut self) -> Option<String> {
        let first_non_empty = self.levels.iter().position(|q| !q.is_empty())?;
        let padding = self.probabilities.mass_before(first_non_empty);
        let seed = padding + self.rng.random::<f64>() * (1.0 - padding);

        let drawn = self.probabilities.level_for(seed).max(first_non_empty);
        let level = (first_non_empty..=drawn)
            .rev()
            .find(|&l| !self.levels[l].is_empty())
            .unwrap_or(first_non_empty);
        self.levels[level].pop()
    }

    /// Strict-priority pop: oldest key of the highest non-empty level.
    pub fn pop_strict(&mut self) -> Option<String> {
        self.levels.iter_mut().find(|q| !q.is_empty())?.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(LevelQueue::is_empty)
    }

    /// Total number of queued keys, or the count for one level.
    pub fn size(&self, level: Option<usize>) -> usize {
        match level {
            Some(l) => self.levels.get(l).map_or(0, LevelQueue::size),
            None => self.levels.iter().map(LevelQueue::size).sum(),
        }
    }

    pub fn size_per_level(&self) -> Vec<usize> {
        self.levels.iter().map(LevelQueue::size).collect()
    }

    /// Remove `key` from whichever level holds it.
    ///
    /// Meant for outright cancellation only; it breaks FIFO order within the
    /// level if used for anything else.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let level = self.get_priority(key)?;
        self.levels[level].remove(key);
        Some(key.to_string())
    }

    pub fn reset(&mut self) {
        for q in &mut self.levels {
            q.reset();
        }
    }

    fn clamp_level(&self, level: usize) -> usize {
        let lowest = self.levels.len() - 1;
        if level > lowest {
            tracing::warn!(level, lowest, "priority out of range, clamped to lowest level");
            return lowest;
        }
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(levels: usize) -> PriorityScheduler {
        PriorityScheduler::with_seed(levels, 7).unwrap()
    }

    #[test]
    fn zero_levels_rejected() {
        assert!(matches!(
            PriorityScheduler::new(0),
            Err(ConfigError::ZeroPriorityLevels)
        ));
    }

    #[test]
    fn get_priority_tracks_minimum_level() {
        let mut s = scheduler(4);
        assert!(s.add("k", 3));
        assert_eq!(s.get_priority("k"), Some(3));
        assert!(s.add("k", 1));
        assert_eq!(s.get_priority("k"), Some(1));
        assert!(!s.add("k", 2));
        assert!(!s.add("k", 1));
        assert_eq!(s.get_priority("k"), Some(1));
        assert_eq!(s.size(None), 1);
        assert!(s.has("k", Some(1)));
        assert!(!s.has("k", Some(3)));
    }

    #[test]
    fn remove_then_add_accepts_worse_priority() {
        let mut s = scheduler(3);
        s.add("k", 0);
        assert_eq!(s.remove("k").as_deref(), Some("k"));
        assert_eq!(s.remove("k"), None);
        assert!(s.add("k", 2));
        assert_eq!(s.get_priority("k"), Some(2));
    }

    #[test]
    fn out_of_range_priority_is_clamped() {
        let mut s = scheduler(2);
        assert!(s.add("k", 9));
        assert_eq!(s.get_priority("k"), Some(1));
        assert!(!s.has("k", Some(9)));
        assert_eq!(s.size(Some(9)), 0);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut s = scheduler(3);
        assert_eq!(s.pop(), None);
        assert!(s.is_empty());
        assert_eq!(s.size_per_level(), vec![0, 0, 0]);
    }

    #[test]
    fn pop_serves_lower_level_when_higher_levels_empty() {
        let mut s = scheduler(3);
        for i in 0..500 {
            s.add(&format!("k{i}"), 2);
        }
        for i in 0..500 {
            assert_eq!(s.pop(), Some(format!("k{i}")));
        }
        assert!(s.is_empty());
    }

    #[test]
    fn pop_never_picks_empty_level_with_gaps() {
        let mut s = scheduler(4);
        for i in 0..200 {
            s.add(&format!("a{i}"), 1);
            s.add(&format!("b{i}"), 3);
        }
        while let Some(key) = s.pop() {
            assert!(key.starts_with('a') || key.starts_with('b'));
        }
        assert_eq!(s.size(None), 0);
    }

    #[test]
    fn pop_preserves_fifo_within_level() {
        let mut s = scheduler(2);
        for i in 0..50 {
            s.add(&format!("hi{i}"), 0);
            s.add(&format!("lo{i}"), 1);
        }
        let mut next_hi = 0;
        let mut next_lo = 0;
        while let Some(key) = s.pop() {
            if let Some(n) = key.strip_prefix("hi") {
                assert_eq!(n.parse::<usize>().unwrap(), next_hi);
                next_hi += 1;
            } else {
                let n = key.strip_prefix("lo").unwrap();
                assert_eq!(n.parse::<usize>().unwrap(), next_lo);
                next_lo += 1;
            }
        }
        assert_eq!((next_hi, next_lo), (50, 50));
    }

    #[test]
    fn selection_frequency_matches_probability_map() {
        const POPS: usize = 100_000;
        let mut s = scheduler(2);
        for i in 0..POPS {
            s.add(&format!("hi{i}"), 0);
            s.add(&format!("lo{i}"), 1);
        }
        let mut from_top = 0usize;
        for _ in 0..POPS {
            if s.pop().unwrap().starts_with("hi") {
                from_top += 1;
            }
        }
        let fraction = from_top as f64 / POPS as f64;
        assert!((fraction - 2.0 / 3.0).abs() < 0.02, "fraction = {fraction}");
    }

    #[test]
    fn lower_level_is_not_starved() {
        let mut s = scheduler(3);
        s.add("starving", 2);
        let mut served = false;
        for i in 0..1_000 {
            // Keep the top level permanently busy.
            s.add(&format!("top{i}"), 0);
            if s.pop().as_deref() == Some("starving") {
                served = true;
                break;
            }
        }
        assert!(served);
    }

    #[test]
    fn pop_strict_ignores_probabilities() {
        let mut s = scheduler(3);
        s.add("low", 2);
        s.add("high", 0);
        assert_eq!(s.pop_strict().as_deref(), Some("high"));
        assert_eq!(s.pop_strict().as_deref(), Some("low"));
        assert_eq!(s.pop_strict(), None);
    }

    #[test]
    fn reset_empties_every_level() {
        let mut s = scheduler(3);
        s.add("a", 0);
        s.add("b", 2);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.size(None), 0);
        assert_eq!(s.get_priority("a"), None);
    }
}
