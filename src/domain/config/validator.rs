use super::model::{ProviderConfig, MAX_TIMEOUT_SECS};
use crate::domain::tts::ProviderId;
use serde::Serialize;
use std::path::Path;

/// Outcome of a configuration check. Only errors block a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            write!(f, "configuration is valid")?;
        } else {
            write!(f, "{}", self.errors.join("; "))?;
        }
        if !self.warnings.is_empty() {
            write!(f, " (warnings: {})", self.warnings.join("; "))?;
        }
        Ok(())
    }
}

/// Offline configuration checks: required fields, credential shape,
/// vendor capabilities and the output directory. Never touches the network.
pub struct ConfigurationValidator;

impl ConfigurationValidator {
    pub fn validate(provider_id: ProviderId, config: &ProviderConfig) -> ValidationReport {
        let mut report = ValidationReport::default();

        if config.provider_id != provider_id {
            report.error(format!(
                "configuration is for {} but {} was requested",
                config.provider_id, provider_id
            ));
        }

        Self::check_credentials(provider_id, config, &mut report);

        if provider_id.has_adapter() && !provider_id.supported_formats().contains(&config.audio_format) {
            let supported: Vec<&str> = provider_id
                .supported_formats()
                .iter()
                .map(|f| f.extension())
                .collect();
            report.error(format!(
                "{} cannot produce {} audio (supported: {})",
                provider_id,
                config.audio_format,
                supported.join(", ")
            ));
        }

        if config.voice().is_none() {
            report.warning(format!(
                "no voice configured, the {} default voice for each script's language will be used",
                provider_id
            ));
        }

        Self::check_advanced_options(config, &mut report);
        Self::check_output_dir(&config.output_dir, &mut report);

        report
    }

    /// Credential problems only, used by adapters' `validate_config`
    pub fn credential_errors(provider_id: ProviderId, config: &ProviderConfig) -> Vec<String> {
        let mut report = ValidationReport::default();
        Self::check_credentials(provider_id, config, &mut report);
        report.errors
    }

    fn check_credentials(provider_id: ProviderId, config: &ProviderConfig, report: &mut ValidationReport) {
        match provider_id {
            ProviderId::OpenAi => {
                if let Some(key) = Self::require(config, "api_key", provider_id, report) {
                    if !key.starts_with("sk-") {
                        report.error("OpenAI api_key must start with 'sk-'");
                    } else if key.len() < 20 {
                        report.error("OpenAI api_key is too short");
                    }
                }
            }
            ProviderId::ElevenLabs => {
                if let Some(key) = Self::require(config, "api_key", provider_id, report) {
                    if key.len() < 32 {
                        report.error("ElevenLabs api_key must be at least 32 characters");
                    } else if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        report.error("ElevenLabs api_key contains unexpected characters");
                    }
                }
            }
            ProviderId::Google => {
                if let Some(key) = Self::require(config, "api_key", provider_id, report) {
                    if !key.starts_with("AIza") {
                        report.error("Google api_key must start with 'AIza'");
                    } else if key.len() != 39 {
                        report.warning("Google api_key is usually 39 characters long");
                    }
                }
            }
            ProviderId::Azure => {
                if let Some(key) = Self::require(config, "subscription_key", provider_id, report) {
                    let classic = key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit());
                    let current = key.len() == 84 && key.chars().all(|c| c.is_ascii_alphanumeric());
                    if !classic && !current {
                        report.warning("Azure subscription_key has an unusual shape");
                    }
                }
                if config.region().is_none() {
                    report.error("azure requires a region (for example 'westeurope')");
                }
            }
            ProviderId::Polly => Self::check_aws_credentials(config, report),
            ProviderId::Murf => {
                report.error(format!("no synthesis adapter is available for {}", provider_id));
            }
        }
    }

    fn check_aws_credentials(config: &ProviderConfig, report: &mut ValidationReport) {
        let access_key = config.credential("access_key_id");
        let secret_key = config.credential("secret_access_key");

        match (access_key, secret_key) {
            (None, None) => {
                report.warning("no AWS keys configured, the default AWS credential chain will be used");
            }
            (Some(_), None) | (None, Some(_)) => {
                report.error("access_key_id and secret_access_key must be provided together");
            }
            (Some(access), Some(secret)) => {
                if access.len() != 20 || !access.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
                    report.error("AWS access_key_id must be 20 uppercase letters or digits");
                }
                if secret.len() != 40 {
                    report.error("AWS secret_access_key must be 40 characters");
                }
            }
        }

        if config.region().is_none() {
            report.warning("no AWS region configured, us-east-1 will be used");
        }
    }

    fn require<'a>(
        config: &'a ProviderConfig,
        key: &str,
        provider_id: ProviderId,
        report: &mut ValidationReport,
    ) -> Option<&'a str> {
        match config.credential(key) {
            Some(value) if value.chars().any(char::is_whitespace) => {
                report.error(format!("{} {} contains whitespace", provider_id, key));
                None
            }
            Some(value) => Some(value),
            None => {
                report.error(format!("{} requires credential '{}'", provider_id, key));
                None
            }
        }
    }

    fn check_advanced_options(config: &ProviderConfig, report: &mut ValidationReport) {
        if let Some(raw) = config.option("timeout_secs") {
            match raw.parse::<u64>() {
                Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => {}
                _ => report.error(format!(
                    "timeout_secs must be a whole number between 1 and {}",
                    MAX_TIMEOUT_SECS
                )),
            }
        }

        if let Some(raw) = config.option("max_concurrency") {
            if !matches!(raw.parse::<usize>(), Ok(n) if n > 0) {
                report.error("max_concurrency must be a positive whole number");
            }
        }

        if let Some(raw) = config.option("speed") {
            if !matches!(raw.parse::<f32>(), Ok(v) if v.is_finite() && v > 0.0) {
                report.error("speed must be a positive number");
            }
        }

        if let Some(endpoint) = config.endpoint() {
            if endpoint.starts_with("http://") {
                report.warning(format!("endpoint {} is not using https", endpoint));
            } else if !endpoint.starts_with("https://") {
                report.error(format!("endpoint {} must be an http(s) URL", endpoint));
            }
        }
    }

    fn check_output_dir(dir: &Path, report: &mut ValidationReport) {
        let metadata = match std::fs::metadata(dir) {
            Ok(metadata) => metadata,
            Err(_) => {
                report.error(format!("output directory {} does not exist", dir.display()));
                return;
            }
        };

        if !metadata.is_dir() {
            report.error(format!("output path {} is not a directory", dir.display()));
            return;
        }

        let marker = dir.join(format!(".voicebatch-write-check-{}", uuid::Uuid::new_v4()));
        match std::fs::write(&marker, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&marker);
            }
            Err(e) => {
                report.error(format!("output directory {} is not writable: {}", dir.display(), e));
            }
        }
    }
}
