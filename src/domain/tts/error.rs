use super::provider::ProviderId;
use std::time::Duration;

/// Raw failure of a single provider call, before classification
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request timed out")]
    Timeout { provider: ProviderId },

    #[error("{provider} connection failed: {message}")]
    Network { provider: ProviderId, message: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: ProviderId,
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Vendor error reported without a usable HTTP status (SDK clients)
    #[error("{provider} API error: {message}")]
    Api {
        provider: ProviderId,
        kind: Option<String>,
        code: Option<String>,
        message: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unexpected response from {provider}: {message}")]
    UnexpectedResponse { provider: ProviderId, message: String },

    #[error("{provider} is misconfigured: {message}")]
    Configuration { provider: ProviderId, message: String },

    #[error("no synthesis adapter is available for {0}")]
    NotImplemented(ProviderId),
}

impl ProviderError {
    /// Vendor-supplied delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
