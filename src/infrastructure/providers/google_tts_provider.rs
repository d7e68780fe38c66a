use super::http::{build_client, ensure_success, map_transport_error};
use super::ssml::voice_locale;
use super::voice_cache::VoiceCache;
use crate::domain::config::ProviderConfig;
use crate::domain::job::JobOptions;
use crate::domain::tts::{
    preflight, AudioFormat, LanguageCode, ProviderError, ProviderId, Voice, VoiceSynthesisProvider,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com";

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaking_rate: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceEntry {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    ssml_gender: Option<String>,
}

/// Google Cloud Text-to-Speech over its REST API, authenticated with an API key
pub struct GoogleTtsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    audio_format: AudioFormat,
    voices: VoiceCache,
}

impl GoogleTtsProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .credential("api_key")
            .ok_or_else(|| ProviderError::Configuration {
                provider: ProviderId::Google,
                message: "api_key is required".to_string(),
            })?
            .to_string();

        Ok(Self {
            client: build_client(ProviderId::Google, config.timeout())?,
            base_url: config.endpoint().unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key,
            audio_format: config.audio_format,
            voices: VoiceCache::new(),
        })
    }

    fn audio_encoding(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Wav => "LINEAR16",
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::Google, e))?;

        let body: VoicesResponse = ensure_success(ProviderId::Google, response)
            .await?
            .json()
            .await
            .map_err(|e| map_transport_error(ProviderId::Google, e))?;

        Ok(body
            .voices
            .into_iter()
            .map(|v| Voice {
                id: v.name.clone(),
                name: v.name,
                language: v.language_codes.into_iter().next(),
                gender: v.ssml_gender,
            })
            .collect())
    }
}

#[async_trait]
impl VoiceSynthesisProvider for GoogleTtsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        preflight(text, self.max_text_chars())?;

        let start_time = std::time::Instant::now();
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: voice_locale(voice),
                name: voice,
            },
            audio_config: AudioConfig {
                audio_encoding: Self::audio_encoding(self.audio_format),
                speaking_rate: options.speed(),
            },
        };

        tracing::info!(
            voice = voice,
            encoding = request.audio_config.audio_encoding,
            text_length = text.chars().count(),
            "Calling Google text:synthesize"
        );

        let response = self
            .client
            .post(format!("{}/v1/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::Google, e))?;

        let body: SynthesizeResponse = ensure_success(ProviderId::Google, response)
            .await?
            .json()
            .await
            .map_err(|e| map_transport_error(ProviderId::Google, e))?;

        let encoded = body
            .audio_content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: ProviderId::Google,
                message: "response has no audioContent".to_string(),
            })?;

        let audio = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderError::UnexpectedResponse {
                provider: ProviderId::Google,
                message: format!("audioContent is not valid base64: {}", e),
            })?;

        tracing::info!(
            provider = "google",
            voice = voice,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        self.voices
            .get_or_fetch(ProviderId::Google, self.fetch_voices())
            .await
    }

    fn default_voice(&self, language: LanguageCode) -> String {
        match language {
            LanguageCode::English => "en-US-Neural2-F",
            LanguageCode::Spanish => "es-ES-Neural2-A",
            LanguageCode::French => "fr-FR-Neural2-A",
            LanguageCode::German => "de-DE-Neural2-A",
            LanguageCode::Italian => "it-IT-Neural2-A",
            LanguageCode::Portuguese => "pt-PT-Wavenet-A",
        }
        .to_string()
    }
}
