use super::error::ProviderError;
use super::language::LanguageCode;
use crate::domain::config::{ConfigurationValidator, ProviderConfig};
use crate::domain::job::JobOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Speech-synthesis vendors known to the engine.
///
/// A vendor being listed here does not mean an adapter exists for it; see
/// [`ProviderId::has_adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Polly,
    ElevenLabs,
    Google,
    Azure,
    Murf,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAi,
        ProviderId::Polly,
        ProviderId::ElevenLabs,
        ProviderId::Google,
        ProviderId::Azure,
        ProviderId::Murf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Polly => "polly",
            ProviderId::ElevenLabs => "elevenlabs",
            ProviderId::Google => "google",
            ProviderId::Azure => "azure",
            ProviderId::Murf => "murf",
        }
    }

    /// Maximum characters accepted in a single synthesis request
    pub fn max_text_chars(&self) -> usize {
        match self {
            ProviderId::OpenAi => 4096,
            ProviderId::Polly => 3000,
            ProviderId::ElevenLabs => 5000,
            ProviderId::Google => 5000,
            ProviderId::Azure => 2000,
            ProviderId::Murf => 3000,
        }
    }

    /// Audio formats the vendor can return without local transcoding
    pub fn supported_formats(&self) -> &'static [AudioFormat] {
        match self {
            ProviderId::OpenAi | ProviderId::Google | ProviderId::Azure => {
                &[AudioFormat::Mp3, AudioFormat::Wav]
            }
            ProviderId::Polly | ProviderId::ElevenLabs => &[AudioFormat::Mp3],
            ProviderId::Murf => &[],
        }
    }

    /// Whether the crate ships a synthesis adapter for this vendor
    pub fn has_adapter(&self) -> bool {
        !matches!(self, ProviderId::Murf)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "polly" | "aws" | "awspolly" => Ok(ProviderId::Polly),
            "elevenlabs" => Ok(ProviderId::ElevenLabs),
            "google" | "googlecloud" | "gcp" => Ok(ProviderId::Google),
            "azure" | "microsoft" => Ok(ProviderId::Azure),
            "murf" => Ok(ProviderId::Murf),
            _ => Err(format!("unknown provider '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" | "wave" => Ok(AudioFormat::Wav),
            other => Err(format!("unsupported audio format '{}'", other)),
        }
    }
}

/// A voice offered by a vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Vendor-neutral speech synthesis.
///
/// Implementations are responsible for:
/// - Rejecting text the vendor cannot accept before any network call
/// - Building the vendor payload and bounding every call with a timeout
/// - Mapping vendor failures into [`ProviderError`]
///
/// Implementations never touch the filesystem; the caller owns the bytes.
#[async_trait]
pub trait VoiceSynthesisProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Synthesize `text` with `voice` and return the encoded audio
    ///
    /// # Errors
    /// Returns [`ProviderError::InvalidInput`] without any network call when
    /// the text is empty or longer than [`max_text_chars`](Self::max_text_chars).
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError>;

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError>;

    /// Voice used when neither the job nor the configuration names one
    fn default_voice(&self, language: LanguageCode) -> String;

    /// Structural and credential-shape check, no network
    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.provider_id == self.id()
            && ConfigurationValidator::credential_errors(self.id(), config).is_empty()
    }

    fn max_text_chars(&self) -> usize {
        self.id().max_text_chars()
    }

    fn supported_formats(&self) -> &'static [AudioFormat] {
        self.id().supported_formats()
    }

    /// Whether concurrent requests from one account are tolerated
    fn supports_concurrency(&self) -> bool {
        true
    }

    /// Cheapest authenticated round trip to the vendor
    async fn test_connectivity(&self) -> Result<(), ProviderError> {
        self.list_voices().await.map(|_| ())
    }
}

/// Local checks run before a request is allowed onto the network
pub fn preflight(text: &str, max_chars: usize) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::InvalidInput(
            "text is empty after trimming whitespace".to_string(),
        ));
    }

    let char_count = text.chars().count();
    if char_count > max_chars {
        return Err(ProviderError::InvalidInput(format!(
            "text has {} characters, provider limit is {}",
            char_count, max_chars
        )));
    }

    Ok(())
}
