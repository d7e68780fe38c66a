use crate::domain::tts::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Bearer token owned by one adapter instance.
///
/// The lock is held while refreshing, so concurrent workers wait for a
/// single refresh instead of each fetching their own token.
#[derive(Debug)]
pub struct TokenCache {
    lifetime: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// `lifetime` should be shorter than the vendor's token validity
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
            tracing::debug!("Cached token expired, refreshing");
        }

        let value = refresh().await?;
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + self.lifetime,
        });
        Ok(value)
    }

    /// Drop the cached token, e.g. after the vendor rejected it
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
