use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    domain::{
        batch::{BatchScheduler, BatchSummary, CancellationFlag, ProgressReporter, SchedulerSettings, TracingProgressReporter},
        config::{ConfigurationValidator, ProviderConfig, ValidationReport},
        job::input::load_json_file,
        tts::{classify, ErrorClassification, ProviderId, Voice},
    },
    error::{AppError, AppResult},
    infrastructure::providers::ProviderRegistry,
};

/// Result of `check`: one authenticated round trip to the vendor
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub provider: ProviderId,
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ErrorClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Entry point for every CLI command
pub struct BatchController {
    registry: Arc<ProviderRegistry>,
    settings: SchedulerSettings,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: CancellationFlag,
}

impl BatchController {
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

    /// Flag that stops dispatching new items when set
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// run - Load rows from `input` and synthesize every one of them
    pub async fn run(&self, input: &Path, config: ProviderConfig) -> AppResult<BatchSummary> {
        let items = load_json_file(input).await?;
        tracing::info!(
            input = %input.display(),
            items = items.len(),
            provider = %config.provider_id,
            "Batch input loaded"
        );

        let scheduler = BatchScheduler::new(self.registry.clone(), self.settings.clone())
            .with_reporter(self.reporter.clone())
            .with_cancellation(self.cancellation.clone());

        let run = scheduler.run(items, config).await?;
        Ok(run.summary())
    }

    /// Create the output directory before a run
    pub async fn prepare_output_dir(&self, dir: &Path) -> AppResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::io(dir, e))
    }

    /// Write the run summary as pretty JSON
    pub async fn write_summary(&self, summary: &BatchSummary, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(summary).map_err(|e| AppError::io(path, e.into()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| AppError::io(path, e))?;
        tracing::info!(path = %path.display(), "Run summary written");
        Ok(())
    }

    /// validate - Offline configuration check
    pub fn validate(&self, config: &ProviderConfig) -> ValidationReport {
        ConfigurationValidator::validate(config.provider_id, config)
    }

    /// voices - Voices offered by the configured vendor
    pub async fn voices(&self, config: &ProviderConfig) -> AppResult<Vec<Voice>> {
        let provider = self.registry.build(config)?;
        let mut voices = provider.list_voices().await?;
        voices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(voices)
    }

    /// check - Prove credentials and network path with the vendor's cheapest call
    pub async fn check(&self, config: &ProviderConfig) -> AppResult<ConnectivityReport> {
        let provider = self.registry.build(config)?;
        let started = Instant::now();
        let outcome = provider.test_connectivity().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let report = match outcome {
            Ok(()) => ConnectivityReport {
                provider: config.provider_id,
                reachable: true,
                latency_ms,
                classification: None,
                message: None,
            },
            Err(error) => {
                let classification = classify(&error);
                tracing::warn!(
                    provider = %config.provider_id,
                    classification = %classification,
                    error = %error,
                    "Connectivity check failed"
                );
                ConnectivityReport {
                    provider: config.provider_id,
                    reachable: false,
                    latency_ms,
                    classification: Some(classification),
                    message: Some(format!("{} ({})", error, classification.remediation_hint())),
                }
            }
        };

        Ok(report)
    }
}
