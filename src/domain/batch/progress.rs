use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Dispatched,
    Finished,
}

/// Snapshot of a run's counters at the moment an item started or finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub current_item_label: String,
}

/// Consumer of progress events (UI, log sink, ...).
///
/// Called from worker tasks; implementations must be cheap and must not block.
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.phase {
            ProgressPhase::Dispatched => tracing::debug!(
                item = %event.current_item_label,
                completed = event.completed,
                total = event.total,
                "Item dispatched"
            ),
            ProgressPhase::Finished => tracing::info!(
                item = %event.current_item_label,
                completed = event.completed,
                total = event.total,
                succeeded = event.succeeded,
                failed = event.failed,
                "Batch progress"
            ),
        }
    }
}

/// Run-wide counters, updated from any worker
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Count one finished item and return the resulting snapshot
    pub fn record(&self, success: bool, label: String) -> ProgressEvent {
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.snapshot(ProgressPhase::Finished, label)
    }

    pub fn snapshot(&self, phase: ProgressPhase, label: String) -> ProgressEvent {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        ProgressEvent {
            phase,
            completed: succeeded + failed,
            total: self.total,
            succeeded,
            failed,
            current_item_label: label,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}
