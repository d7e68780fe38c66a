use super::progress::{ProgressCounters, ProgressPhase, ProgressReporter, TracingProgressReporter};
use super::run::{BatchRun, CancellationFlag, ExecutionMode};
use crate::domain::config::{ConfigurationValidator, ProviderConfig, ValidationReport};
use crate::domain::job::{output_file_name, JobItem, JobResult};
use crate::domain::tts::{
    classify, preflight, resolve_language, ErrorClassification, ProviderError, RetryExecutor,
    RetryPolicy, VoiceSynthesisProvider,
};
use crate::infrastructure::providers::ProviderRegistry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Floor for the pause between items in sequential mode
pub const MIN_SEQUENTIAL_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Upper bound on parallel workers; the config's `max_concurrency` wins when set
    pub max_concurrency: usize,
    /// Item count from which the worker pool is used
    pub parallel_threshold: usize,
    pub sequential_delay: Duration,
    pub retry: RetryPolicy,
    /// Core count to plan for; the machine's own count when `None`
    pub available_cores: Option<usize>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            parallel_threshold: 10,
            sequential_delay: Duration::from_millis(150),
            retry: RetryPolicy::default(),
            available_cores: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("configuration is invalid: {0}")]
    InvalidConfig(ValidationReport),

    #[error("batch has no items")]
    EmptyBatch,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Worker count grows with the batch but stays low for small batches
fn size_heuristic(item_count: usize) -> usize {
    match item_count {
        0..=19 => 2,
        20..=49 => 4,
        50..=199 => 8,
        _ => 16,
    }
}

/// `min(configured_max, available_cores, heuristic(item_count))`, at least 1
pub fn concurrency_level(configured_max: usize, available_cores: usize, item_count: usize) -> usize {
    configured_max
        .min(available_cores)
        .min(size_heuristic(item_count))
        .min(item_count)
        .max(1)
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs job items through retry and a provider, one at a time or on a
/// bounded worker pool, reporting progress after every item.
pub struct BatchScheduler {
    registry: Arc<ProviderRegistry>,
    settings: SchedulerSettings,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: CancellationFlag,
}

impl BatchScheduler {
    pub fn new(registry: Arc<ProviderRegistry>, settings: SchedulerSettings) -> Self {
        Self {
            registry,
            settings,
            reporter: Arc::new(TracingProgressReporter),
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Handle to cancel the run from outside
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Validate, resolve the provider and execute every item.
    ///
    /// Item failures never abort the run; they end up in the run's results.
    ///
    /// # Errors
    /// Refuses to start on an invalid configuration, an empty batch or a
    /// provider that cannot be built.
    pub async fn run(&self, items: Vec<JobItem>, config: ProviderConfig) -> Result<BatchRun, BatchError> {
        if !self.registry.is_registered(config.provider_id) {
            tracing::error!(provider = %config.provider_id, "No synthesis adapter registered");
            return Err(ProviderError::NotImplemented(config.provider_id).into());
        }

        let report = ConfigurationValidator::validate(config.provider_id, &config);
        for warning in &report.warnings {
            tracing::warn!(provider = %config.provider_id, warning = %warning, "Configuration warning");
        }
        if !report.is_valid() {
            tracing::error!(provider = %config.provider_id, errors = ?report.errors, "Configuration rejected");
            return Err(BatchError::InvalidConfig(report));
        }
        if items.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let provider = self.registry.build(&config)?;
        let config = Arc::new(config);
        let total = items.len();

        let configured_max = config.max_concurrency().unwrap_or(self.settings.max_concurrency);
        let cores = self.settings.available_cores.unwrap_or_else(available_cores);
        let level = concurrency_level(configured_max, cores, total);
        let mode = if total >= self.settings.parallel_threshold && provider.supports_concurrency() && level > 1 {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        let level = match mode {
            ExecutionMode::Parallel => level,
            ExecutionMode::Sequential => 1,
        };

        let mut run = BatchRun::start(items.clone(), config.clone(), mode, level);
        tracing::info!(
            run_id = %run.run_id,
            provider = %config.provider_id,
            total = total,
            mode = ?mode,
            concurrency = level,
            "Batch run started"
        );

        let ctx = Arc::new(RunContext {
            provider,
            config,
            executor: RetryExecutor::new(self.settings.retry),
            reporter: self.reporter.clone(),
            counters: ProgressCounters::new(total),
            results: Mutex::new(BTreeMap::new()),
            cancellation: self.cancellation.clone(),
            duplicate_stems: duplicate_stems(&items),
        });

        match mode {
            ExecutionMode::Sequential => {
                let delay = self.settings.sequential_delay.max(MIN_SEQUENTIAL_DELAY);
                run_sequential(&ctx, items, delay).await;
            }
            ExecutionMode::Parallel => run_parallel(ctx.clone(), items, level).await,
        }

        let results = std::mem::take(&mut *ctx.results.lock().unwrap_or_else(PoisonError::into_inner));
        run.finish(results, self.cancellation.is_cancelled());

        tracing::info!(
            run_id = %run.run_id,
            state = %run.state,
            succeeded = run.succeeded(),
            failed = run.failed(),
            skipped = run.skipped(),
            total = total,
            "Batch run finished"
        );

        Ok(run)
    }
}

fn duplicate_stems(items: &[JobItem]) -> HashSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.file_stem()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(stem, _)| stem.to_string())
        .collect()
}

async fn run_sequential(ctx: &RunContext, items: Vec<JobItem>, delay: Duration) {
    let last = items.len().saturating_sub(1);
    for (position, item) in items.into_iter().enumerate() {
        if ctx.cancellation.is_cancelled() {
            tracing::info!(next_item = %item.label(), "Cancellation observed, stopping dispatch");
            break;
        }

        let result = ctx.process(&item).await;
        ctx.publish(&item, result);

        if position < last {
            tokio::time::sleep(delay).await;
        }
    }
}

async fn run_parallel(ctx: Arc<RunContext>, items: Vec<JobItem>, level: usize) {
    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let mut workers = JoinSet::new();

    for worker_id in 0..level {
        let ctx = ctx.clone();
        let queue = queue.clone();
        workers.spawn(async move {
            loop {
                if ctx.cancellation.is_cancelled() {
                    tracing::info!(worker_id = worker_id, "Cancellation observed, worker stopping");
                    break;
                }

                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some(item) = next else {
                    break;
                };

                let result = ctx.process(&item).await;
                ctx.publish(&item, result);
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Batch worker terminated abnormally");
        }
    }
}

/// State shared by every worker of one run
struct RunContext {
    provider: Arc<dyn VoiceSynthesisProvider>,
    config: Arc<ProviderConfig>,
    executor: RetryExecutor,
    reporter: Arc<dyn ProgressReporter>,
    counters: ProgressCounters,
    results: Mutex<BTreeMap<usize, JobResult>>,
    cancellation: CancellationFlag,
    duplicate_stems: HashSet<String>,
}

impl RunContext {
    async fn process(&self, item: &JobItem) -> JobResult {
        let started = Instant::now();
        let label = item.label();
        self.reporter
            .on_progress(&self.counters.snapshot(ProgressPhase::Dispatched, label.clone()));

        if let Err(error) = preflight(&item.text, self.provider.max_text_chars()) {
            return self.failure(item, "", &error, 0, started);
        }

        let voice = self.resolve_voice(item);
        let Some(path) = self.output_path(item, &voice) else {
            tracing::error!(job_index = item.index, voice = %voice, "Output name escapes the output directory");
            return JobResult::failed(
                item.index,
                ErrorClassification::InvalidInput,
                format!("output name for {} does not stay inside the output directory", item.label()),
                0,
                elapsed_ms(started),
            );
        };

        let outcome = self
            .executor
            .execute(&label, || self.provider.synthesize(&item.text, &voice, &item.options))
            .await;

        let audio = match outcome.result {
            Ok(audio) => audio,
            Err(error) => return self.failure(item, &voice, &error, outcome.attempts, started),
        };

        if let Err(e) = tokio::fs::write(&path, &audio).await {
            tracing::error!(
                job_index = item.index,
                path = %path.display(),
                error = %e,
                "Failed to write synthesized audio"
            );
            return JobResult::failed(
                item.index,
                ErrorClassification::Fatal,
                format!("could not write {}: {}", path.display(), e),
                outcome.attempts,
                elapsed_ms(started),
            );
        }

        tracing::info!(
            job_index = item.index,
            provider = %self.config.provider_id,
            voice = %voice,
            attempts = outcome.attempts,
            audio_size_bytes = audio.len(),
            latency_ms = elapsed_ms(started),
            path = %path.display(),
            "Job synthesized"
        );

        JobResult::succeeded(
            item.index,
            path,
            audio.len() as u64,
            outcome.attempts,
            elapsed_ms(started),
        )
    }

    fn publish(&self, item: &JobItem, result: JobResult) {
        let event = self.counters.record(result.is_success(), item.label());
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(result.job_index(), result);
        self.reporter.on_progress(&event);
    }

    /// Job option, then configured voice, then the vendor default for the text's language
    fn resolve_voice(&self, item: &JobItem) -> String {
        item.options
            .voice()
            .or_else(|| self.config.voice())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let language = resolve_language(&item.text, &item.options);
                self.provider.default_voice(language)
            })
    }

    fn output_path(&self, item: &JobItem, voice: &str) -> Option<PathBuf> {
        let stem = if self.duplicate_stems.contains(item.file_stem()) {
            format!("{}_{}", item.file_stem(), item.index + 1)
        } else {
            item.file_stem().to_string()
        };
        let name = output_file_name(&stem, self.config.provider_id, voice, self.config.audio_format);
        artifact_path(&self.config.output_dir, &name)
    }

    fn failure(&self, item: &JobItem, voice: &str, error: &ProviderError, attempts: u32, started: Instant) -> JobResult {
        let classification = classify(error);
        if classification == ErrorClassification::Fatal {
            tracing::error!(
                job_index = item.index,
                provider = %self.config.provider_id,
                voice = voice,
                attempts = attempts,
                text_length = item.text.chars().count(),
                error = ?error,
                "Job failed with an unexpected error"
            );
        } else {
            tracing::warn!(
                job_index = item.index,
                provider = %self.config.provider_id,
                classification = %classification,
                attempts = attempts,
                error = %error,
                "Job failed"
            );
        }
        JobResult::failed(item.index, classification, error.to_string(), attempts, elapsed_ms(started))
    }
}

/// `output_dir/name`, or `None` unless `name` is one plain path component
fn artifact_path(output_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(output_dir.join(name)),
        _ => None,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
