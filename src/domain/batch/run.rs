use crate::domain::config::ProviderConfig;
use crate::domain::job::{JobItem, JobResult};
use crate::domain::tts::ErrorClassification;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    PartiallyFailed,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::PartiallyFailed | BatchState::Cancelled
        )
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchState::Idle => "idle",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::PartiallyFailed => "partially_failed",
            BatchState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Shared cancel signal, polled before each dispatch.
///
/// Cancelling never interrupts a call already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One execution of the scheduler over a list of job items
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub items: Vec<JobItem>,
    pub config: Arc<ProviderConfig>,
    pub mode: ExecutionMode,
    pub concurrency_level: usize,
    pub results: BTreeMap<usize, JobResult>,
    pub state: BatchState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchRun {
    pub(crate) fn start(
        items: Vec<JobItem>,
        config: Arc<ProviderConfig>,
        mode: ExecutionMode,
        concurrency_level: usize,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            items,
            config,
            mode,
            concurrency_level,
            results: BTreeMap::new(),
            state: BatchState::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Settle the terminal state from the collected results.
    ///
    /// Outside cancellation every item was dispatched, so an item without a
    /// result lost its worker and is recorded as a fatal failure.
    pub(crate) fn finish(&mut self, mut results: BTreeMap<usize, JobResult>, cancelled: bool) {
        if !cancelled {
            for item in &self.items {
                results.entry(item.index).or_insert_with(|| {
                    tracing::error!(job_index = item.index, label = %item.label(), "Item finished without a result");
                    JobResult::failed(
                        item.index,
                        ErrorClassification::Fatal,
                        "worker stopped before recording a result".to_string(),
                        0,
                        0,
                    )
                });
            }
        }
        self.results = results;
        self.state = if cancelled && self.skipped() > 0 {
            BatchState::Cancelled
        } else if self.failed() > 0 {
            BatchState::PartiallyFailed
        } else {
            BatchState::Completed
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| !r.is_success()).count()
    }

    /// Items never dispatched because the run was cancelled
    pub fn skipped(&self) -> usize {
        self.total() - self.results.len()
    }

    pub fn result(&self, job_index: usize) -> Option<&JobResult> {
        self.results.get(&job_index)
    }

    pub fn summary(&self) -> BatchSummary {
        let labels: BTreeMap<usize, String> = self.items.iter().map(|i| (i.index, i.label())).collect();
        let failures = self
            .results
            .values()
            .filter_map(|result| {
                result.failure().map(|failure| FailureSummary {
                    job_index: result.job_index(),
                    label: labels.get(&result.job_index()).cloned().unwrap_or_default(),
                    classification: failure.classification,
                    message: failure.message.clone(),
                    remediation: failure.remediation.clone(),
                })
            })
            .collect();

        let elapsed_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0);

        BatchSummary {
            run_id: self.run_id,
            provider: self.config.provider_id.to_string(),
            state: self.state,
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            elapsed_ms,
            failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub job_index: usize,
    pub label: String,
    pub classification: ErrorClassification,
    pub message: String,
    pub remediation: String,
}

/// What the caller gets to show: counts plus every failure with its class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub provider: String,
    pub state: BatchState,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
    pub failures: Vec<FailureSummary>,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} succeeded ({}, {} failed, {} skipped)",
            self.succeeded, self.total, self.state, self.failed, self.skipped
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  {} [{}] {} - {}",
                failure.label, failure.classification, failure.message, failure.remediation
            )?;
        }
        Ok(())
    }
}
