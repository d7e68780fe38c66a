use crate::domain::tts::{ProviderError, ProviderId, Voice};
use moka::future::Cache;
use std::future::Future;
use std::time::Duration;

const VOICE_LIST_TTL: Duration = Duration::from_secs(30 * 60);

/// Per-adapter cache of the vendor's voice catalogue
#[derive(Clone)]
pub struct VoiceCache {
    inner: Cache<ProviderId, Vec<Voice>>,
}

impl VoiceCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(1)
                .time_to_live(VOICE_LIST_TTL)
                .build(),
        }
    }

    /// Cached list, or the result of `fetch` when absent or expired.
    /// Failures are not cached.
    pub async fn get_or_fetch<F>(&self, provider: ProviderId, fetch: F) -> Result<Vec<Voice>, ProviderError>
    where
        F: Future<Output = Result<Vec<Voice>, ProviderError>>,
    {
        self.inner
            .try_get_with(provider, fetch)
            .await
            .map_err(|e| (*e).clone())
    }
}

impl Default for VoiceCache {
    fn default() -> Self {
        Self::new()
    }
}
