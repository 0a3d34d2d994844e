//! Strong counter for changeset-number allocation.
//!
//! `increment` yields strictly increasing values across concurrent callers.
//! The counter is sharded: its value is the sum of its shard counts, and
//! each allocation bumps one shard picked round-robin inside a datastore
//! transaction. Under a distributed store the transaction becomes a
//! per-shard compare-and-swap whose retries may skip values — the contract
//! is gap-tolerant monotonicity, never repetition.

use crate::datastore::{CounterRow, Datastore};
use crate::error::Result;

/// Counter name backing changeset-number allocation.
pub const CHANGESET_COUNTER: &str = "num_changesets";

/// A named strong counter over the entity datastore.
#[derive(Clone)]
pub struct StrongCounter {
    ds: Datastore,
    shard_count: usize,
}

impl StrongCounter {
    /// Create a counter handle with the given shard count (minimum 1).
    #[must_use]
    pub fn new(ds: Datastore, shard_count: usize) -> Self {
        Self {
            ds,
            shard_count: shard_count.max(1),
        }
    }

    /// Allocate the next value of counter `name`.
    ///
    /// # Errors
    /// Propagates datastore transaction failures.
    pub fn increment(&self, name: &str) -> Result<u64> {
        let shard_count = self.shard_count;
        self.ds.transaction(|tables| {
            let row = tables
                .counters
                .entry(name.to_owned())
                .or_insert_with(|| CounterRow {
                    shards: vec![0; shard_count],
                    cursor: 0,
                });
            let next = row.shards.iter().sum::<u64>() + 1;
            let cursor = row.cursor;
            row.shards[cursor] += 1;
            row.cursor = (cursor + 1) % row.shards.len();
            Ok(next)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_strictly_increase() {
        let counter = StrongCounter::new(Datastore::new(), 4);
        let mut last = 0;
        for _ in 0..50 {
            let value = counter.increment(CHANGESET_COUNTER).unwrap();
            assert!(value > last, "{value} must be > {last}");
            last = value;
        }
        assert_eq!(last, 50);
    }

    #[test]
    fn counters_are_independent() {
        let counter = StrongCounter::new(Datastore::new(), 2);
        assert_eq!(counter.increment("a").unwrap(), 1);
        assert_eq!(counter.increment("b").unwrap(), 1);
        assert_eq!(counter.increment("a").unwrap(), 2);
    }

    #[test]
    fn concurrent_allocations_never_repeat() {
        use std::collections::HashSet;
        use std::sync::{Arc, Mutex};

        let counter = StrongCounter::new(Datastore::new(), 8);
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counter = counter.clone();
            let seen = Arc::clone(&seen);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let value = counter.increment(CHANGESET_COUNTER).unwrap();
                    assert!(seen.lock().unwrap().insert(value), "duplicate {value}");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 400);
    }
}
