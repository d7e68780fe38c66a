pub mod progress;
pub mod run;
pub mod scheduler;

pub use progress::{ProgressEvent, ProgressPhase, ProgressReporter, TracingProgressReporter};
pub use run::{BatchRun, BatchState, BatchSummary, CancellationFlag, ExecutionMode, FailureSummary};
pub use scheduler::{concurrency_level, BatchError, BatchScheduler, SchedulerSettings};
