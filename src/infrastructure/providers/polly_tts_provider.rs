use super::ssml::escape_xml;
use super::voice_cache::VoiceCache;
use crate::domain::config::ProviderConfig;
use crate::domain::job::JobOptions;
use crate::domain::tts::{
    preflight, LanguageCode, ProviderError, ProviderId, Voice, VoiceSynthesisProvider,
};
use async_trait::async_trait;
use aws_sdk_polly::{
    config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{Engine, OutputFormat, TextType, VoiceId},
    Client as PollyClient,
};
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_REGION: &str = "us-east-1";

/// Where the AWS client gets its credentials from
enum ClientSource {
    /// Built eagerly from keys in the configuration
    Explicit(PollyClient),
    /// AWS default credential chain, resolved on first use
    DefaultChain {
        region: String,
        endpoint: Option<String>,
        cell: OnceCell<PollyClient>,
    },
}

/// AWS Polly implementation through `aws-sdk-polly`, neural engine only
pub struct PollyTtsProvider {
    source: ClientSource,
    timeout: Duration,
    voices: VoiceCache,
}

impl PollyTtsProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let region = config.region().unwrap_or(DEFAULT_REGION).to_string();
        let timeout = config.timeout();
        let endpoint = config.endpoint().map(str::to_string);

        let source = match (
            config.credential("access_key_id"),
            config.credential("secret_access_key"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => {
                let credentials = Credentials::new(
                    access_key_id,
                    secret_access_key,
                    config.credential("session_token").map(str::to_string),
                    None,
                    "voicebatch",
                );
                let mut builder = aws_sdk_polly::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(region))
                    .credentials_provider(credentials)
                    .timeout_config(Self::timeout_config(timeout))
                    .retry_config(RetryConfig::disabled());
                if let Some(endpoint) = endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                ClientSource::Explicit(PollyClient::from_conf(builder.build()))
            }
            (None, None) => ClientSource::DefaultChain {
                region,
                endpoint,
                cell: OnceCell::new(),
            },
            _ => {
                return Err(ProviderError::Configuration {
                    provider: ProviderId::Polly,
                    message: "access_key_id and secret_access_key must be set together".to_string(),
                })
            }
        };

        Ok(Self {
            source,
            timeout,
            voices: VoiceCache::new(),
        })
    }

    fn timeout_config(timeout: Duration) -> TimeoutConfig {
        TimeoutConfig::builder().operation_timeout(timeout).build()
    }

    async fn client(&self) -> &PollyClient {
        match &self.source {
            ClientSource::Explicit(client) => client,
            ClientSource::DefaultChain {
                region,
                endpoint,
                cell,
            } => {
                cell.get_or_init(|| async {
                    tracing::debug!(region = %region, "Loading AWS default credential chain");
                    let shared = aws_config::defaults(BehaviorVersion::latest())
                        .region(Region::new(region.clone()))
                        .timeout_config(Self::timeout_config(self.timeout))
                        .retry_config(RetryConfig::disabled())
                        .load()
                        .await;
                    let mut builder = aws_sdk_polly::config::Builder::from(&shared);
                    if let Some(endpoint) = endpoint {
                        builder = builder.endpoint_url(endpoint.clone());
                    }
                    PollyClient::from_conf(builder.build())
                })
                .await
            }
        }
    }

    /// Plain text unless a speaking rate needs SSML prosody
    fn request_text(text: &str, options: &JobOptions) -> (String, TextType) {
        match options.speed() {
            Some(speed) => {
                let percent = (speed * 100.0).round().clamp(20.0, 200.0) as u32;
                (
                    format!(
                        "<speak><prosody rate=\"{}%\">{}</prosody></speak>",
                        percent,
                        escape_xml(text)
                    ),
                    TextType::Ssml,
                )
            }
            None => (text.to_string(), TextType::Text),
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        let client = self.client().await;
        let mut voices = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client
                .describe_voices()
                .engine(Engine::Neural)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            voices.extend(output.voices.unwrap_or_default().into_iter().filter_map(|v| {
                let id = v.id?.as_str().to_string();
                Some(Voice {
                    name: v.name.unwrap_or_else(|| id.clone()),
                    id,
                    language: v.language_code.map(|l| l.as_str().to_string()),
                    gender: v.gender.map(|g| g.as_str().to_string()),
                })
            }));

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(voices)
    }
}

fn map_sdk_error<E>(error: SdkError<E>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = error.code().map(str::to_string);
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

    match &error {
        SdkError::TimeoutError(_) => ProviderError::Timeout {
            provider: ProviderId::Polly,
        },
        SdkError::DispatchFailure(failure) if failure.is_timeout() => ProviderError::Timeout {
            provider: ProviderId::Polly,
        },
        SdkError::DispatchFailure(_) => ProviderError::Network {
            provider: ProviderId::Polly,
            message,
        },
        SdkError::ServiceError(context) => ProviderError::Http {
            provider: ProviderId::Polly,
            status: context.raw().status().as_u16(),
            code,
            message,
            retry_after: None,
        },
        SdkError::ResponseError(_) => ProviderError::UnexpectedResponse {
            provider: ProviderId::Polly,
            message,
        },
        _ => ProviderError::Configuration {
            provider: ProviderId::Polly,
            message,
        },
    }
}

#[async_trait]
impl VoiceSynthesisProvider for PollyTtsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Polly
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &JobOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        preflight(text, self.max_text_chars())?;

        let start_time = std::time::Instant::now();
        let (request_text, text_type) = Self::request_text(text, options);

        tracing::info!(
            voice = voice,
            engine = "neural",
            output_format = "mp3",
            text_length = text.chars().count(),
            "Calling AWS Polly synthesize_speech"
        );

        let result = self
            .client()
            .await
            .synthesize_speech()
            .text(request_text)
            .text_type(text_type)
            .voice_id(VoiceId::from(voice))
            .output_format(OutputFormat::Mp3)
            .engine(Engine::Neural)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let audio = result
            .audio_stream
            .collect()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse {
                provider: ProviderId::Polly,
                message: format!("failed to read audio stream: {}", e),
            })?
            .into_bytes()
            .to_vec();

        if audio.is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                provider: ProviderId::Polly,
                message: "empty audio stream".to_string(),
            });
        }

        tracing::info!(
            provider = "polly",
            voice = voice,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        self.voices
            .get_or_fetch(ProviderId::Polly, self.fetch_voices())
            .await
    }

    fn default_voice(&self, language: LanguageCode) -> String {
        match language {
            LanguageCode::English => "Joanna",
            LanguageCode::Spanish => "Lupe",
            LanguageCode::French => "Lea",
            LanguageCode::German => "Vicki",
            LanguageCode::Italian => "Bianca",
            LanguageCode::Portuguese => "Ines",
        }
        .to_string()
    }
}
