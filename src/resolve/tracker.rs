//! Per-call work tracking
//!
//! Every `resolve_record` call owns one `ResolutionTracker`. Sub-resolutions
//! and row fetches register a `WorkGuard` while in flight; `TaskGroup` spawns
//! attribute work onto the runtime and joins all of it before the caller sees
//! a result, so the outstanding count is zero once the call returns.

use crate::error::ResolveError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Default)]
struct Counters {
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    fetches: AtomicUsize,
    records: AtomicUsize,
}

/// Shared counters for one top-level resolution
#[derive(Debug, Clone, Default)]
pub struct ResolutionTracker {
    counters: Arc<Counters>,
}

/// Snapshot of a tracker's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Work units still in flight (zero after completion)
    pub outstanding: usize,
    /// Highest number of concurrent work units observed
    pub peak_outstanding: usize,
    /// Row queries issued
    pub fetches: usize,
    /// Records resolved, the top-level one included
    pub records: usize,
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of in-flight work
    pub fn enter(&self) -> WorkGuard {
        let now = self.counters.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        WorkGuard {
            counters: self.counters.clone(),
        }
    }

    /// Register a row query
    pub fn enter_fetch(&self) -> WorkGuard {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        self.enter()
    }

    /// Register the resolution of one record
    pub fn enter_record(&self) -> WorkGuard {
        self.counters.records.fetch_add(1, Ordering::SeqCst);
        self.enter()
    }

    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ResolutionStats {
        ResolutionStats {
            outstanding: self.outstanding(),
            peak_outstanding: self.counters.peak.load(Ordering::SeqCst),
            fetches: self.counters.fetches.load(Ordering::SeqCst),
            records: self.counters.records.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the outstanding count when dropped
#[derive(Debug)]
pub struct WorkGuard {
    counters: Arc<Counters>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.counters.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawned tasks registered with a tracker; `join` waits for every one
pub struct TaskGroup<T> {
    tracker: ResolutionTracker,
    set: JoinSet<T>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(tracker: ResolutionTracker) -> Self {
        TaskGroup {
            tracker,
            set: JoinSet::new(),
        }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let guard = self.tracker.enter();
        self.set.spawn(async move {
            let output = task.await;
            drop(guard);
            output
        });
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Wait for all tasks, in completion order. A task that panicked is
    /// reported as `TaskFailed`; the others still run to completion.
    pub async fn join(mut self) -> Vec<Result<T, ResolveError>> {
        let mut results = Vec::with_capacity(self.set.len());
        while let Some(joined) = self.set.join_next().await {
            results.push(joined.map_err(|e| ResolveError::TaskFailed(e.to_string())));
        }
        results
    }
}
