//! Registry of in-flight fetches: key -> cancellation token.
//!
//! Each admitted key is registered with a fresh token and a ticket. A
//! completion only clears the entry if its ticket still matches, so a fetch
//! that outlives a `reset` cannot remove the entry of a later admission of
//! the same key.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

/// Identifies one admission of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
struct InFlight {
    ticket: Ticket,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct PendingSet {
    entries: HashMap<String, InFlight>,
    next_ticket: u64,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` as in flight; returns the ticket and the token to pass to the fetch.
    pub fn register(&mut self, key: &str) -> (Ticket, CancellationToken) {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let token = CancellationToken::new();
        self.entries.insert(
            key.to_string(),
            InFlight {
                ticket,
                token: token.clone(),
            },
        );
        (ticket, token)
    }

    /// Clear the entry for a finished fetch. False if the key is untracked or
    /// belongs to a newer admission.
    pub fn complete(&mut self, key: &str, ticket: Ticket) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.ticket == ticket => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Signal cancellation for `key`. The entry stays until the fetch completes.
    pub fn abort(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal cancellation for every in-flight fetch; returns how many were signalled.
    pub fn abort_all(&self) -> usize {
        for entry in self.entries.values() {
            entry.token.cancel();
        }
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Forget every entry without cancelling the fetches.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_complete() {
        let mut p = PendingSet::new();
        let (ticket, token) = p.register("a");
        assert!(p.contains("a"));
        assert_eq!(p.len(), 1);
        assert!(!token.is_cancelled());
        assert!(p.complete("a", ticket));
        assert!(!p.complete("a", ticket));
        assert!(p.is_empty());
    }

    #[test]
    fn stale_ticket_does_not_clear_newer_entry() {
        let mut p = PendingSet::new();
        let (old, _) = p.register("a");
        p.clear();
        let (new, _) = p.register("a");
        assert!(!p.complete("a", old));
        assert!(p.contains("a"));
        assert!(p.complete("a", new));
    }

    #[test]
    fn abort_signals_token_and_keeps_entry() {
        let mut p = PendingSet::new();
        let (_, token) = p.register("a");
        assert!(p.abort("a"));
        assert!(token.is_cancelled());
        assert!(p.contains("a"));
        assert!(!p.abort("missing"));
    }

    #[test]
    fn abort_all_and_clear() {
        let mut p = PendingSet::new();
        let (_, t1) = p.register("a");
        let (_, t2) = p.register("b");
        assert_eq!(p.abort_all(), 2);
        assert!(t1.is_cancelled() && t2.is_cancelled());
        let mut keys: Vec<_> = p.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
        p.clear();
        assert!(p.is_empty());
    }
}
