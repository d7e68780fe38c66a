use super::http::map_transport_error;
use crate::domain::config::ProviderConfig;
use crate::domain::job::JobOptions;
use crate::domain::tts::{
    preflight, AudioFormat, LanguageCode, ProviderError, ProviderId, Voice, VoiceSynthesisProvider,
};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, SpeechResponseFormat, Voice as OpenAiVoice},
    Client,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

const DEFAULT_MODEL: &str = "tts-1";

/// Voices offered by the speech endpoint
const VOICE_CATALOGUE: [(&str, &str); 6] = [
    ("alloy", "neutral"),
    ("echo", "male"),
    ("fable", "neutral"),
    ("onyx", "male"),
    ("nova", "female"),
    ("shimmer", "female"),
];

/// OpenAI speech endpoint through `async-openai`
pub struct OpenAiTtsProvider {
    client: Client<OpenAIConfig>,
    model: String,
    audio_format: AudioFormat,
    timeout: Duration,
}

impl OpenAiTtsProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .credential("api_key")
            .ok_or_else(|| ProviderError::Configuration {
                provider: ProviderId::OpenAi,
                message: "api_key is required".to_string(),
            })?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(endpoint) = config.endpoint() {
            openai_config = openai_config.with_api_base(endpoint);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Configuration {
                provider: ProviderId::OpenAi,
                message: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.option("model").unwrap_or(DEFAULT_MODEL).to_string(),
            audio_format: config.audio_format,
            timeout: config.timeout(),
        })
    }

    fn speech_model(name: &str) -> SpeechModel {
        match name {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }

    fn speech_voice(name: &str) -> Result<OpenAiVoice, ProviderError> {
        match name.to_lowercase().as_str() {
            "alloy" => Ok(OpenAiVoice::Alloy),
            "echo" => Ok(OpenAiVoice::Echo),
            "fable" => Ok(OpenAiVoice::Fable),
            "onyx" => Ok(OpenAiVoice::Onyx),
            "nova" => Ok(OpenAiVoice::Nova),
            "shimmer" => Ok(OpenAiVoice::Shimmer),
            other => Err(ProviderError::InvalidInput(format!(
                "unknown OpenAI voice '{}'",
                other
            ))),
        }
    }

    fn response_format(format: AudioFormat) -> SpeechResponseFormat {
        match format {
            AudioFormat::Mp3 => SpeechResponseFormat::Mp3,
            AudioFormat::Wav => SpeechResponseFormat::Wav,
        }
    }

    /// The client retries rate-limited calls on its own; the outer
    /// deadline keeps every call within the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, OpenAIError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(map_openai_error),
            Err(_) => Err(ProviderError::Timeout {
                provider: ProviderId::OpenAi,
            }),
        }
    }
}

fn map_openai_error(error: OpenAIError) -> ProviderError {
    match error {
        OpenAIError::Reqwest(e) => map_transport_error(ProviderId::OpenAi, e),
        OpenAIError::ApiError(api) => ProviderError::Api {
            provider: ProviderId::OpenAi,
            kind: api.r#type.clone(),
            code: api
                .code
                .as_ref()
                .map(|c| c.to_string().trim_matches('"').to_string()),
            message: api.message,
        },
        OpenAIError::JSONDeserialize(e) => ProviderError::UnexpectedResponse {
            provider: ProviderId::OpenAi,
            message: e.to_string(),
        },
        OpenAIError::InvalidArgument(message) => ProviderError::InvalidInput(message),
        other => ProviderError::UnexpectedResponse {
            provider: ProviderId::OpenAi,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl VoiceSynthesisProvider for OpenAiTtsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        preflight(text, self.max_text_chars())?;

        let start_time = std::time::Instant::now();
        let model = options.get("model").unwrap_or(self.model.as_str());
        let request = CreateSpeechRequest {
            model: Self::speech_model(model),
            input: text.to_string(),
            voice: Self::speech_voice(voice)?,
            response_format: Some(Self::response_format(self.audio_format)),
            speed: options.speed().map(|s| s.clamp(0.25, 4.0)),
        };

        tracing::info!(
            model = model,
            voice = voice,
            text_length = text.chars().count(),
            "Calling OpenAI TTS API"
        );

        let response = self
            .bounded(self.client.audio().speech(request))
            .await
            .inspect_err(|e| {
                tracing::debug!(error = %e, model = model, voice = voice, "OpenAI TTS API call failed");
            })?;

        let audio = response.bytes.to_vec();
        if audio.is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                provider: ProviderId::OpenAi,
                message: "empty audio body".to_string(),
            });
        }

        tracing::info!(
            provider = "openai",
            model = model,
            voice = voice,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        Ok(VOICE_CATALOGUE
            .iter()
            .map(|(id, gender)| Voice {
                id: id.to_string(),
                name: id.to_string(),
                language: None,
                gender: Some(gender.to_string()),
            })
            .collect())
    }

    /// Voices chosen per language for how they carry it
    fn default_voice(&self, language: LanguageCode) -> String {
        match language {
            LanguageCode::English => "alloy",
            LanguageCode::Spanish => "echo",
            LanguageCode::French => "nova",
            LanguageCode::German => "onyx",
            LanguageCode::Italian => "fable",
            LanguageCode::Portuguese => "shimmer",
        }
        .to_string()
    }

    /// The voice catalogue is static, so list models to prove the key works
    async fn test_connectivity(&self) -> Result<(), ProviderError> {
        self.bounded(self.client.models().list()).await.map(|_| ())
    }
}
