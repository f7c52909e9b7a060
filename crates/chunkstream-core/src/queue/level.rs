//! FIFO queue of unique string keys for a single priority level.

use std::collections::{HashSet, VecDeque};

/// First-in-first-out sequence of unique keys with constant-time membership.
///
/// A key appears at most once; adding a key that is already queued is a no-op
/// and does not change its position.
#[derive(Debug, Clone, Default)]
pub struct LevelQueue {
    order: VecDeque<String>,
    keys: HashSet<String>,
}

impl LevelQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` at the back. Returns false if it was already queued.
    pub fn add(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        self.keys.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Remove and return the oldest key.
    pub fn pop(&mut self) -> Option<String> {
        let key = self.order.pop_front()?;
        self.keys.remove(&key);
        Some(key)
    }

    /// Oldest key (next to be popped), without removing it.
    pub fn first(&self) -> Option<&str> {
        self.order.front().map(String::as_str)
    }

    /// Most recently added key, without removing it.
    pub fn last(&self) -> Option<&str> {
        self.order.back().map(String::as_str)
    }

    /// Remove an arbitrary key. Linear in the queue length.
    pub fn remove(&mut self, key: &str) -> bool {
        if !self.keys.remove(key) {
            return false;
        }
        if let Some(index) = self.order.iter().position(|k| k == key) {
            self.order.remove(index);
        }
        true
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_insertion_order() {
        let mut q = LevelQueue::new();
        assert!(q.add("a"));
        assert!(q.add("b"));
        assert!(q.add("c"));
        assert_eq!(q.first(), Some("a"));
        assert_eq!(q.last(), Some("c"));
        assert_eq!(q.pop().as_deref(), Some("a"));
        assert_eq!(q.pop().as_deref(), Some("b"));
        assert_eq!(q.pop().as_deref(), Some("c"));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn duplicate_add_keeps_original_position() {
        let mut q = LevelQueue::new();
        q.add("a");
        q.add("b");
        assert!(!q.add("a"));
        assert_eq!(q.size(), 2);
        assert_eq!(q.pop().as_deref(), Some("a"));
    }

    #[test]
    fn remove_arbitrary_key() {
        let mut q = LevelQueue::new();
        q.add("a");
        q.add("b");
        q.add("c");
        assert!(q.remove("b"));
        assert!(!q.remove("b"));
        assert!(!q.has("b"));
        assert_eq!(q.size(), 2);
        assert_eq!(q.pop().as_deref(), Some("a"));
        assert_eq!(q.pop().as_deref(), Some("c"));
    }

    #[test]
    fn reset_clears_membership() {
        let mut q = LevelQueue::new();
        q.add("a");
        q.reset();
        assert!(q.is_empty());
        assert!(!q.has("a"));
        assert!(q.add("a"));
    }
}
