use crate::domain::batch::SchedulerSettings;
use crate::domain::config::ProviderConfig;
use crate::domain::tts::{AudioFormat, ProviderId, RetryPolicy};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of environment variables forwarded as advanced provider options
const OPTION_PREFIX: &str = "TTS_OPT_";

/// Vendor credential variables and the config keys they fill
const CREDENTIAL_VARS: [(ProviderId, &str, &str); 8] = [
    (ProviderId::OpenAi, "OPENAI_API_KEY", "api_key"),
    (ProviderId::Polly, "AWS_ACCESS_KEY_ID", "access_key_id"),
    (ProviderId::Polly, "AWS_SECRET_ACCESS_KEY", "secret_access_key"),
    (ProviderId::Polly, "AWS_SESSION_TOKEN", "session_token"),
    (ProviderId::ElevenLabs, "ELEVENLABS_API_KEY", "api_key"),
    (ProviderId::Google, "GOOGLE_TTS_API_KEY", "api_key"),
    (ProviderId::Azure, "AZURE_SPEECH_KEY", "subscription_key"),
    (ProviderId::Murf, "MURF_API_KEY", "api_key"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub provider: ProviderId,
    pub voice: Option<String>,
    pub region: Option<String>,
    pub audio_format: AudioFormat,
    pub output_dir: PathBuf,
    pub max_concurrency: usize,
    pub parallel_threshold: usize,
    pub sequential_delay_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub log_format: LogFormat,
    credentials: BTreeMap<ProviderId, BTreeMap<String, String>>,
    advanced_options: BTreeMap<String, String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let configured: Vec<&ProviderId> = self.credentials.keys().collect();
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("voice", &self.voice)
            .field("region", &self.region)
            .field("audio_format", &self.audio_format)
            .field("output_dir", &self.output_dir)
            .field("max_concurrency", &self.max_concurrency)
            .field("parallel_threshold", &self.parallel_threshold)
            .field("log_format", &self.log_format)
            .field("credentials_for", &configured)
            .field("advanced_options", &self.advanced_options)
            .finish()
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn optional_var(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load from the process environment, after reading `.env` if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let mut credentials: BTreeMap<ProviderId, BTreeMap<String, String>> = BTreeMap::new();
        for (provider, var, key) in CREDENTIAL_VARS {
            if let Some(value) = optional_var(&vars, var) {
                credentials.entry(provider).or_default().insert(key.to_string(), value);
            }
        }

        let advanced_options = vars
            .iter()
            .filter_map(|(name, value)| {
                let key = name.strip_prefix(OPTION_PREFIX)?;
                let value = value.trim();
                (!key.is_empty() && !value.is_empty()).then(|| (key.to_lowercase(), value.to_string()))
            })
            .collect();

        let log_format = match optional_var(&vars, "LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            provider: parse_var(&vars, "TTS_PROVIDER", ProviderId::OpenAi)?,
            voice: optional_var(&vars, "TTS_VOICE"),
            region: optional_var(&vars, "TTS_REGION")
                .or_else(|| optional_var(&vars, "AZURE_SPEECH_REGION"))
                .or_else(|| optional_var(&vars, "AWS_REGION")),
            audio_format: parse_var(&vars, "TTS_AUDIO_FORMAT", AudioFormat::Mp3)?,
            output_dir: PathBuf::from(
                optional_var(&vars, "OUTPUT_DIR").unwrap_or_else(|| "./output".to_string()),
            ),
            max_concurrency: parse_var(&vars, "MAX_CONCURRENCY", 4)?,
            parallel_threshold: parse_var(&vars, "PARALLEL_THRESHOLD", 10)?,
            sequential_delay_ms: parse_var(&vars, "SEQUENTIAL_DELAY_MS", 150)?,
            retry_max_attempts: parse_var(&vars, "RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay_ms: parse_var(&vars, "RETRY_BASE_DELAY_MS", 1000)?,
            retry_max_delay_ms: parse_var(&vars, "RETRY_MAX_DELAY_MS", 30000)?,
            log_format,
            credentials,
            advanced_options,
        })
    }

    /// Command-line concurrency, replacing `MAX_CONCURRENCY` and any `TTS_OPT_MAX_CONCURRENCY`
    pub fn override_concurrency(&mut self, concurrency: usize) {
        self.max_concurrency = concurrency;
        self.advanced_options
            .insert("max_concurrency".to_string(), concurrency.to_string());
    }

    /// Provider configuration for `provider`, carrying only that vendor's credentials
    pub fn provider_config(&self, provider: ProviderId) -> ProviderConfig {
        let mut config = ProviderConfig::new(provider, self.output_dir.clone())
            .with_audio_format(self.audio_format);
        config.credentials = self.credentials.get(&provider).cloned().unwrap_or_default();
        config.region = self.region.clone();
        config.voice = self.voice.clone();
        config.advanced_options = self.advanced_options.clone();
        config
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_concurrency: self.max_concurrency.max(1),
            parallel_threshold: self.parallel_threshold,
            sequential_delay: Duration::from_millis(self.sequential_delay_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
            available_cores: None,
        }
    }
}
