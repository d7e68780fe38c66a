use super::http::{build_client, ensure_success, error_from_response, map_transport_error};
use super::ssml::{escape_xml, voice_locale};
use super::token_cache::TokenCache;
use super::voice_cache::VoiceCache;
use crate::domain::config::ProviderConfig;
use crate::domain::job::JobOptions;
use crate::domain::tts::{
    preflight, AudioFormat, LanguageCode, ProviderError, ProviderId, Voice, VoiceSynthesisProvider,
};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Tokens are valid for ten minutes; refresh a minute early
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(9 * 60);
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VoiceEntry {
    short_name: String,
    display_name: Option<String>,
    locale: Option<String>,
    gender: Option<String>,
}

/// Azure Speech text-to-speech over REST, with a cached bearer token
pub struct AzureTtsProvider {
    client: reqwest::Client,
    token_url: String,
    synthesis_base: String,
    subscription_key: String,
    audio_format: AudioFormat,
    token: TokenCache,
    voices: VoiceCache,
}

impl AzureTtsProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let configuration_error = |message: &str| ProviderError::Configuration {
            provider: ProviderId::Azure,
            message: message.to_string(),
        };

        let subscription_key = config
            .credential("subscription_key")
            .ok_or_else(|| configuration_error("subscription_key is required"))?
            .to_string();

        let (token_url, synthesis_base) = match config.endpoint() {
            Some(endpoint) => (
                format!("{}/sts/v1.0/issueToken", endpoint),
                endpoint.to_string(),
            ),
            None => {
                let region = config
                    .region()
                    .ok_or_else(|| configuration_error("region is required"))?;
                (
                    format!("https://{}.api.cognitive.microsoft.com/sts/v1.0/issueToken", region),
                    format!("https://{}.tts.speech.microsoft.com", region),
                )
            }
        };

        Ok(Self {
            client: build_client(ProviderId::Azure, config.timeout())?,
            token_url,
            synthesis_base,
            subscription_key,
            audio_format: config.audio_format,
            token: TokenCache::new(TOKEN_REFRESH_AFTER),
            voices: VoiceCache::new(),
        })
    }

    fn output_format(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "audio-24khz-96kbitrate-mono-mp3",
            AudioFormat::Wav => "riff-24khz-16bit-mono-pcm",
        }
    }

    async fn issue_token(&self) -> Result<String, ProviderError> {
        tracing::debug!("Requesting Azure Speech access token");

        let response = self
            .client
            .post(&self.token_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))?;

        let token = ensure_success(ProviderId::Azure, response)
            .await?
            .text()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))?;

        if token.trim().is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                provider: ProviderId::Azure,
                message: "issueToken returned an empty token".to_string(),
            });
        }
        Ok(token.trim().to_string())
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        self.token.get_or_refresh(|| self.issue_token()).await
    }

    async fn post_ssml(&self, token: &str, ssml: &str) -> Result<reqwest::Response, ProviderError> {
        self.client
            .post(format!("{}/cognitiveservices/v1", self.synthesis_base))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(OUTPUT_FORMAT_HEADER, Self::output_format(self.audio_format))
            .body(ssml.to_string())
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/cognitiveservices/voices/list", self.synthesis_base))
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))?;

        let entries: Vec<VoiceEntry> = ensure_success(ProviderId::Azure, response)
            .await?
            .json()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))?;

        Ok(entries
            .into_iter()
            .map(|v| Voice {
                name: v.display_name.unwrap_or_else(|| v.short_name.clone()),
                id: v.short_name,
                language: v.locale,
                gender: v.gender,
            })
            .collect())
    }
}

pub(crate) fn build_ssml(text: &str, voice: &str, speed: Option<f32>) -> String {
    let body = escape_xml(text);
    let body = match speed {
        Some(speed) => {
            let percent = ((speed - 1.0) * 100.0).round() as i32;
            format!("<prosody rate='{:+}%'>{}</prosody>", percent, body)
        }
        None => body,
    };

    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        voice_locale(voice),
        escape_xml(voice),
        body
    )
}

#[async_trait]
impl VoiceSynthesisProvider for AzureTtsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Azure
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        preflight(text, self.max_text_chars())?;

        let start_time = std::time::Instant::now();
        let ssml = build_ssml(text, voice, options.speed());

        tracing::info!(
            voice = voice,
            output_format = Self::output_format(self.audio_format),
            text_length = text.chars().count(),
            "Calling Azure Speech synthesis"
        );

        let token = self.access_token().await?;
        let mut response = self.post_ssml(&token, &ssml).await?;

        // A token revoked before its expiry gets one fresh attempt
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Azure rejected cached token, refreshing");
            self.token.invalidate().await;
            let token = self.access_token().await?;
            response = self.post_ssml(&token, &ssml).await?;
        }

        if !response.status().is_success() {
            if response.status() == StatusCode::UNAUTHORIZED {
                self.token.invalidate().await;
            }
            return Err(error_from_response(ProviderId::Azure, response).await);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(ProviderId::Azure, e))?;

        if audio.is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                provider: ProviderId::Azure,
                message: "empty audio body".to_string(),
            });
        }

        tracing::info!(
            provider = "azure",
            voice = voice,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio.to_vec())
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        self.voices
            .get_or_fetch(ProviderId::Azure, self.fetch_voices())
            .await
    }

    fn default_voice(&self, language: LanguageCode) -> String {
        match language {
            LanguageCode::English => "en-US-JennyNeural",
            LanguageCode::Spanish => "es-ES-ElviraNeural",
            LanguageCode::French => "fr-FR-DeniseNeural",
            LanguageCode::German => "de-DE-KatjaNeural",
            LanguageCode::Italian => "it-IT-ElsaNeural",
            LanguageCode::Portuguese => "pt-PT-RaquelNeural",
        }
        .to_string()
    }

    /// Issuing a token proves both key and region
    async fn test_connectivity(&self) -> Result<(), ProviderError> {
        self.token.invalidate().await;
        self.access_token().await.map(|_| ())
    }
}
