use super::filename::sanitize_file_stem;
use crate::domain::tts::ErrorClassification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-job overrides (`voice`, `speed`, `language`, ...), keys lower-case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobOptions(BTreeMap<String, String>);

impl JobOptions {
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(key.as_ref().to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&key.to_lowercase())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn voice(&self) -> Option<&str> {
        self.get("voice")
    }

    pub fn language(&self) -> Option<&str> {
        self.get("language")
    }

    /// Speaking rate multiplier, ignored when not a positive number
    pub fn speed(&self) -> Option<f32> {
        self.get("speed")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for JobOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = JobOptions::default();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

/// One line of work: a script to synthesize into one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JobItemRecord")]
pub struct JobItem {
    pub index: usize,
    pub text: String,
    file_stem: String,
    pub options: JobOptions,
}

/// Wire shape of a `JobItem`; the stem goes back through sanitising on the way in
#[derive(Deserialize)]
struct JobItemRecord {
    index: usize,
    text: String,
    file_stem: String,
    #[serde(default)]
    options: JobOptions,
}

impl From<JobItemRecord> for JobItem {
    fn from(record: JobItemRecord) -> Self {
        JobItem::new(record.index, record.text, &record.file_stem, record.options)
    }
}

impl JobItem {
    /// The file base name is sanitised here, before anything can use it
    pub fn new(index: usize, text: impl Into<String>, file_base_name: &str, options: JobOptions) -> Self {
        Self {
            index,
            text: text.into(),
            file_stem: sanitize_file_stem(file_base_name),
            options,
        }
    }

    pub fn file_stem(&self) -> &str {
        &self.file_stem
    }

    /// Human label used in progress events and logs
    pub fn label(&self) -> String {
        format!("#{} {}", self.index + 1, self.file_stem)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub classification: ErrorClassification,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { output_path: PathBuf },
    Failed(JobFailure),
}

/// Result of one job. Built by the scheduler and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    job_index: usize,
    outcome: JobOutcome,
    byte_size: u64,
    attempts: u32,
    elapsed_ms: u64,
}

impl JobResult {
    pub(crate) fn succeeded(
        job_index: usize,
        output_path: PathBuf,
        byte_size: u64,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            job_index,
            outcome: JobOutcome::Succeeded { output_path },
            byte_size,
            attempts,
            elapsed_ms,
        }
    }

    pub(crate) fn failed(
        job_index: usize,
        classification: ErrorClassification,
        message: String,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            job_index,
            outcome: JobOutcome::Failed(JobFailure {
                classification,
                message,
                remediation: classification.remediation_hint().to_string(),
            }),
            byte_size: 0,
            attempts,
            elapsed_ms,
        }
    }

    pub fn job_index(&self) -> usize {
        self.job_index
    }

    pub fn outcome(&self) -> &JobOutcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            JobOutcome::Succeeded { output_path } => Some(output_path),
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            JobOutcome::Failed(failure) => Some(failure),
            JobOutcome::Succeeded { .. } => None,
        }
    }

    pub fn classification(&self) -> Option<ErrorClassification> {
        self.failure().map(|f| f.classification)
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}
