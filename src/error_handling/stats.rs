//! Fetch outcome statistics.
//!
//! This module provides thread-safe counters for request outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::OutcomeType;

/// Thread-safe fetch statistics tracker.
///
/// Tracks request outcomes using atomic counters, allowing concurrent access
/// from multiple request tasks. All outcome types are initialized to zero on
/// creation.
///
/// # Thread Safety
///
/// This struct is thread-safe and can be shared across multiple tasks using `Arc`.
#[derive(Debug)]
pub struct FetchStats {
    outcomes: HashMap<OutcomeType, AtomicUsize>,
}

impl FetchStats {
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        for outcome in OutcomeType::iter() {
            outcomes.insert(outcome, AtomicUsize::new(0));
        }
        FetchStats { outcomes }
    }

    /// Increment an outcome counter.
    pub fn increment(&self, outcome: OutcomeType) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment outcome counter for {:?} which is not in the map. \
                 This indicates a bug in FetchStats initialization.",
                outcome
            );
        }
    }

    /// Get the count for an outcome type.
    pub fn get(&self, outcome: OutcomeType) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total number of requests that reached a terminal outcome.
    pub fn total(&self) -> usize {
        self.outcomes
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    /// One-line summary of non-zero counters, e.g. `completed=2 timed out=1`.
    pub fn summary(&self) -> String {
        OutcomeType::iter()
            .filter_map(|outcome| {
                let count = self.get(outcome);
                (count > 0).then(|| format!("{outcome}={count}"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for FetchStats {
    fn default() -> Self {
        Self::new()
    }
}
