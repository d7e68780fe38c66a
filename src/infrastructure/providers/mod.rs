pub mod azure_tts_provider;
pub mod elevenlabs_tts_provider;
pub mod google_tts_provider;
pub mod http;
pub mod openai_tts_provider;
pub mod polly_tts_provider;
pub mod ssml;
pub mod token_cache;
pub mod voice_cache;

pub use azure_tts_provider::AzureTtsProvider;
pub use elevenlabs_tts_provider::ElevenLabsTtsProvider;
pub use google_tts_provider::GoogleTtsProvider;
pub use openai_tts_provider::OpenAiTtsProvider;
pub use polly_tts_provider::PollyTtsProvider;
pub use token_cache::TokenCache;
pub use voice_cache::VoiceCache;

use crate::domain::config::ProviderConfig;
use crate::domain::tts::{ProviderError, ProviderId, VoiceSynthesisProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an adapter for one run from its configuration
pub type ProviderFactory = Arc<
    dyn Fn(&ProviderConfig) -> Result<Arc<dyn VoiceSynthesisProvider>, ProviderError> + Send + Sync,
>;

/// Maps each vendor to the factory that builds its adapter.
///
/// Resolved once per batch; a vendor without a registered factory fails
/// with [`ProviderError::NotImplemented`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderId, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every adapter shipped with the crate
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderId::OpenAi, |config| {
            Ok(Arc::new(OpenAiTtsProvider::from_config(config)?))
        });
        registry.register(ProviderId::Polly, |config| {
            Ok(Arc::new(PollyTtsProvider::from_config(config)?))
        });
        registry.register(ProviderId::ElevenLabs, |config| {
            Ok(Arc::new(ElevenLabsTtsProvider::from_config(config)?))
        });
        registry.register(ProviderId::Google, |config| {
            Ok(Arc::new(GoogleTtsProvider::from_config(config)?))
        });
        registry.register(ProviderId::Azure, |config| {
            Ok(Arc::new(AzureTtsProvider::from_config(config)?))
        });
        registry
    }

    /// Register or replace the factory for `id`
    pub fn register<F>(&mut self, id: ProviderId, factory: F) -> &mut Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn VoiceSynthesisProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id, Arc::new(factory));
        self
    }

    pub fn is_registered(&self, id: ProviderId) -> bool {
        self.factories.contains_key(&id)
    }

    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn VoiceSynthesisProvider>, ProviderError> {
        let factory = self
            .factories
            .get(&config.provider_id)
            .ok_or(ProviderError::NotImplemented(config.provider_id))?;

        let provider = factory(config)?;
        tracing::debug!(provider = %config.provider_id, "Provider adapter built");
        Ok(provider)
    }
}
