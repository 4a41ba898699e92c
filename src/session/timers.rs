//! Timeline of deferred session actions.
//!
//! [`TimerSet`] is the single owner of every action a running session has
//! scheduled. Actions come out in `(due, registration)` order, so actions
//! sharing a due instant keep the order they were scheduled in.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

struct Entry<A> {
    due: Instant,
    seq: u64,
    action: A,
}

impl<A> PartialEq for Entry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<A> Eq for Entry<A> {}

impl<A> PartialOrd for Entry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Entry<A> {
    // Reversed: `BinaryHeap` is a max-heap and the earliest entry must win.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Ordered set of pending actions.
pub struct TimerSet<A> {
    heap: BinaryHeap<Entry<A>>,
    next_seq: u64,
}

impl<A> TimerSet<A> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `action` at `due`.
    pub fn schedule(&mut self, due: Instant, action: A) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, action });
    }

    /// Due instant of the earliest pending action.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.due)
    }

    /// Removes and returns the earliest action if it is due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, A)> {
        if self.heap.peek()?.due > now {
            return None;
        }
        self.heap.pop().map(|e| (e.due, e.action))
    }

    /// Drops every pending action without running it.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<A> Default for TimerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> std::fmt::Debug for TimerSet<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSet")
            .field("pending", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pops_in_due_order() {
        let base = Instant::now();
        let mut timers = TimerSet::new();
        timers.schedule(base + Duration::from_secs(3), "c");
        timers.schedule(base + Duration::from_secs(1), "a");
        timers.schedule(base + Duration::from_secs(2), "b");

        let later = base + Duration::from_secs(10);
        let order: Vec<&str> = std::iter::from_fn(|| timers.pop_due(later).map(|(_, a)| a)).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let due = Instant::now();
        let mut timers = TimerSet::new();
        for label in ["first", "second", "third"] {
            timers.schedule(due, label);
        }
        let order: Vec<&str> = std::iter::from_fn(|| timers.pop_due(due).map(|(_, a)| a)).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_not_yet_due_stays() {
        let base = Instant::now();
        let mut timers = TimerSet::new();
        timers.schedule(base + Duration::from_secs(5), ());
        assert!(timers.pop_due(base).is_none());
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_due(), Some(base + Duration::from_secs(5)));
    }

    #[test]
    fn test_clear() {
        let mut timers = TimerSet::new();
        timers.schedule(Instant::now(), 1);
        timers.schedule(Instant::now(), 2);
        timers.clear();
        assert!(timers.is_empty());
        assert!(timers.next_due().is_none());
    }
}
