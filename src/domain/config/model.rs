use crate::domain::tts::{AudioFormat, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Everything an adapter needs for one run.
///
/// Built by the caller, validated once, then shared read-only behind an
/// `Arc` by every worker of the run.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    pub credentials: BTreeMap<String, String>,
    pub region: Option<String>,
    pub voice: Option<String>,
    pub audio_format: AudioFormat,
    pub output_dir: PathBuf,
    pub advanced_options: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(provider_id: ProviderId, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider_id,
            credentials: BTreeMap::new(),
            region: None,
            voice: None,
            audio_format: AudioFormat::Mp3,
            output_dir: output_dir.into(),
            advanced_options: BTreeMap::new(),
        }
    }

    pub fn with_credential(mut self, key: &str, value: impl Into<String>) -> Self {
        self.credentials.insert(key.to_string(), value.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_audio_format(mut self, format: AudioFormat) -> Self {
        self.audio_format = format;
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.advanced_options.insert(key.to_lowercase(), value.into());
        self
    }

    /// Credential value, `None` when absent or blank
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.advanced_options
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Per-call timeout, clamped to `1..=60` seconds
    pub fn timeout(&self) -> Duration {
        let secs = self
            .option("timeout_secs")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Base URL override for the vendor API, without trailing slash
    pub fn endpoint(&self) -> Option<&str> {
        self.option("endpoint").map(|v| v.trim_end_matches('/'))
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.option("max_concurrency")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted: BTreeMap<&str, &str> = self
            .credentials
            .keys()
            .map(|k| (k.as_str(), "<redacted>"))
            .collect();
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("credentials", &redacted)
            .field("region", &self.region)
            .field("voice", &self.voice)
            .field("audio_format", &self.audio_format)
            .field("output_dir", &self.output_dir)
            .field("advanced_options", &self.advanced_options)
            .finish()
    }
}
