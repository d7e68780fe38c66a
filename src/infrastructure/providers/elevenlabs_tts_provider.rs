use super::http::{build_client, ensure_success, map_transport_error};
use super::voice_cache::VoiceCache;
use crate::domain::config::ProviderConfig;
use crate::domain::job::JobOptions;
use crate::domain::tts::{
    preflight, LanguageCode, ProviderError, ProviderId, Voice, VoiceSynthesisProvider,
};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";
/// "Rachel", available on every account
const FALLBACK_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceEntry>,
}

#[derive(Debug, Deserialize)]
struct VoiceEntry {
    voice_id: String,
    name: String,
    #[serde(default)]
    labels: std::collections::HashMap<String, String>,
}

/// ElevenLabs text-to-speech over its REST API
pub struct ElevenLabsTtsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    voices: VoiceCache,
}

impl ElevenLabsTtsProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .credential("api_key")
            .ok_or_else(|| ProviderError::Configuration {
                provider: ProviderId::ElevenLabs,
                message: "api_key is required".to_string(),
            })?
            .to_string();

        Ok(Self {
            client: build_client(ProviderId::ElevenLabs, config.timeout())?,
            base_url: config.endpoint().unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key,
            model_id: config
                .option("model_id")
                .unwrap_or(DEFAULT_MODEL_ID)
                .to_string(),
            voices: VoiceCache::new(),
        })
    }

    fn voice_settings(options: &JobOptions) -> VoiceSettings {
        let parse = |key: &str, default: f32| {
            options
                .get(key)
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| (0.0..=1.0).contains(v))
                .unwrap_or(default)
        };

        VoiceSettings {
            stability: parse("stability", 0.5),
            similarity_boost: parse("similarity_boost", 0.75),
            speed: options.speed(),
        }
    }

    /// The voice id becomes one percent-encoded path segment
    fn synthesis_url(&self, voice: &str) -> Result<Url, ProviderError> {
        if voice.is_empty() || voice == "." || voice == ".." {
            return Err(ProviderError::InvalidInput(format!("'{}' is not a voice id", voice)));
        }

        let mut url = Url::parse(&self.base_url).map_err(|e| ProviderError::Configuration {
            provider: ProviderId::ElevenLabs,
            message: format!("invalid endpoint '{}': {}", self.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Configuration {
                provider: ProviderId::ElevenLabs,
                message: format!("endpoint '{}' cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice]);
        url.query_pairs_mut().append_pair("output_format", OUTPUT_FORMAT);
        Ok(url)
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::ElevenLabs, e))?;

        let body: VoicesResponse = ensure_success(ProviderId::ElevenLabs, response)
            .await?
            .json()
            .await
            .map_err(|e| map_transport_error(ProviderId::ElevenLabs, e))?;

        Ok(body
            .voices
            .into_iter()
            .map(|v| Voice {
                language: v.labels.get("language").cloned(),
                gender: v.labels.get("gender").cloned(),
                id: v.voice_id,
                name: v.name,
            })
            .collect())
    }
}

#[async_trait]
impl VoiceSynthesisProvider for ElevenLabsTtsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::ElevenLabs
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        preflight(text, self.max_text_chars())?;

        let start_time = std::time::Instant::now();
        let model_id = options.get("model_id").unwrap_or(self.model_id.as_str());
        let request = SpeechRequest {
            text,
            model_id,
            voice_settings: Self::voice_settings(options),
        };

        tracing::info!(
            voice = voice,
            model = model_id,
            text_length = text.chars().count(),
            "Calling ElevenLabs text-to-speech"
        );

        let response = self
            .client
            .post(self.synthesis_url(voice)?)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::ElevenLabs, e))?;

        let audio = ensure_success(ProviderId::ElevenLabs, response)
            .await?
            .bytes()
            .await
            .map_err(|e| map_transport_error(ProviderId::ElevenLabs, e))?;

        if audio.is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                provider: ProviderId::ElevenLabs,
                message: "empty audio body".to_string(),
            });
        }

        tracing::info!(
            provider = "elevenlabs",
            voice = voice,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio.to_vec())
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        self.voices
            .get_or_fetch(ProviderId::ElevenLabs, self.fetch_voices())
            .await
    }

    /// The multilingual model speaks every supported language with one voice
    fn default_voice(&self, _language: LanguageCode) -> String {
        FALLBACK_VOICE_ID.to_string()
    }

    async fn test_connectivity(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/user", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::ElevenLabs, e))?;

        ensure_success(ProviderId::ElevenLabs, response).await.map(|_| ())
    }
}
