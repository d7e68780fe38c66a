//! Plumbing shared by the REST adapters: client construction and mapping
//! of transport and HTTP failures into [`ProviderError`].

use crate::domain::tts::{ProviderError, ProviderId};
use reqwest::header::RETRY_AFTER;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("voicebatch/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt kept in an error message
const MAX_ERROR_BODY: usize = 300;

pub fn build_client(provider: ProviderId, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Configuration {
            provider,
            message: format!("could not build HTTP client: {}", e),
        })
}

pub fn map_transport_error(provider: ProviderId, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout { provider }
    } else if error.is_decode() {
        ProviderError::UnexpectedResponse {
            provider,
            message: error.to_string(),
        }
    } else {
        ProviderError::Network {
            provider,
            message: error.to_string(),
        }
    }
}

/// Seconds form of `Retry-After`; HTTP-date values are ignored
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn string_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(body, |value, key| value.get(*key))
        .and_then(Value::as_str)
}

/// Pull a machine-readable code out of the common vendor error shapes
fn extract_code(body: &Value) -> Option<String> {
    [
        &["detail", "status"][..],
        &["error", "status"][..],
        &["error", "code"][..],
        &["code"][..],
    ]
    .iter()
    .find_map(|path| string_at(body, path))
    .map(str::to_string)
}

fn extract_message(body: &Value) -> Option<String> {
    [
        &["detail", "message"][..],
        &["error", "message"][..],
        &["message"][..],
        &["detail"][..],
    ]
    .iter()
    .find_map(|path| string_at(body, path))
    .map(str::to_string)
}

/// Consume a non-success response into a [`ProviderError::Http`]
pub async fn error_from_response(provider: ProviderId, response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    let parsed = serde_json::from_str::<Value>(&body).ok();
    let code = parsed.as_ref().and_then(extract_code);
    let message = parsed
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());

    tracing::debug!(
        provider = %provider,
        status = status,
        code = ?code,
        retry_after_secs = retry_after.map(|d| d.as_secs()),
        "Vendor returned an error response"
    );

    ProviderError::Http {
        provider,
        status,
        code,
        message,
        retry_after,
    }
}

/// Pass successful responses through, turn the rest into errors
pub async fn ensure_success(provider: ProviderId, response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(provider, response).await)
    }
}
