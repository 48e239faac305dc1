use crate::types::SearchResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Point-in-time view of a fan-out's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchProgress {
    /// Units finished, successful or not.
    pub completed: usize,
    /// Units that produced no evidence.
    pub failed: usize,
    /// Units in the plan.
    pub total: usize,
}

impl SearchProgress {
    /// Units that produced evidence.
    pub fn succeeded(&self) -> usize {
        self.completed - self.failed
    }
}

/// Counts completed searches for one fan-out. Telemetry only; nothing in
/// the pipeline branches on it.
#[derive(Debug)]
pub struct SearchMonitor {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl SearchMonitor {
    /// A monitor for a fan-out of `total` units.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Record one finished unit and return the new completed count.
    pub fn record(&self, result: &SearchResult) -> usize {
        if result.is_err() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total;
        info!("Searching... {completed}/{total} completed");
        completed
    }

    /// Units finished so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Units that failed so far.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// True once every unit has reported.
    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total
    }

    /// Current counts.
    pub fn snapshot(&self) -> SearchProgress {
        SearchProgress {
            completed: self.completed(),
            failed: self.failed(),
            total: self.total,
        }
    }
}
