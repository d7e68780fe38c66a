use super::error::ProviderError;
use serde::{Deserialize, Serialize};

/// Vendor codes that signal a quota or rate limit rather than a generic outage
const QUOTA_MARKERS: &[&str] = &[
    "quota_exceeded",
    "insufficient_quota",
    "rate_limit_exceeded",
    "too_many_concurrent_requests",
    "throttlingexception",
    "resource_exhausted",
];

const AUTH_MARKERS: &[&str] = &[
    "invalid_api_key",
    "authentication_error",
    "unauthorized",
    "incorrect api key",
];

/// Failure taxonomy shared by retry policy and user-facing reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClassification {
    Transient,
    Authentication,
    QuotaExceeded,
    InvalidInput,
    Fatal,
    NotImplemented,
}

impl ErrorClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClassification::Transient => "transient",
            ErrorClassification::Authentication => "authentication",
            ErrorClassification::QuotaExceeded => "quota_exceeded",
            ErrorClassification::InvalidInput => "invalid_input",
            ErrorClassification::Fatal => "fatal",
            ErrorClassification::NotImplemented => "not_implemented",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClassification::Transient | ErrorClassification::QuotaExceeded
        )
    }

    pub fn remediation_hint(&self) -> &'static str {
        match self {
            ErrorClassification::Transient => {
                "The provider was temporarily unavailable. Re-run the failed items later."
            }
            ErrorClassification::Authentication => {
                "Check the API key or access credentials and the account's permissions."
            }
            ErrorClassification::QuotaExceeded => {
                "The account hit its quota or rate limit. Lower the concurrency or wait for the quota to reset."
            }
            ErrorClassification::InvalidInput => {
                "Fix the script text or voice for this item; retrying unchanged will fail again."
            }
            ErrorClassification::Fatal => {
                "Unexpected failure. See the log output for the full diagnostic context."
            }
            ErrorClassification::NotImplemented => {
                "This provider has no synthesis adapter yet. Choose another provider."
            }
        }
    }
}

impl std::fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn contains_marker(value: Option<&str>, markers: &[&str]) -> bool {
    value
        .map(|v| v.to_lowercase())
        .is_some_and(|v| markers.iter().any(|m| v.contains(m)))
}

/// Map a raw provider failure onto the taxonomy
pub fn classify(error: &ProviderError) -> ErrorClassification {
    match error {
        ProviderError::Timeout { .. } | ProviderError::Network { .. } => {
            ErrorClassification::Transient
        }
        ProviderError::InvalidInput(_) => ErrorClassification::InvalidInput,
        ProviderError::NotImplemented(_) => ErrorClassification::NotImplemented,
        ProviderError::UnexpectedResponse { .. } | ProviderError::Configuration { .. } => {
            ErrorClassification::Fatal
        }
        ProviderError::Http {
            status,
            code,
            retry_after,
            ..
        } => {
            if contains_marker(code.as_deref(), QUOTA_MARKERS) {
                return ErrorClassification::QuotaExceeded;
            }
            match status {
                401 | 403 => ErrorClassification::Authentication,
                429 if retry_after.is_some() => ErrorClassification::QuotaExceeded,
                429 | 408 | 500..=599 => ErrorClassification::Transient,
                400 | 404 | 413 | 422 => ErrorClassification::InvalidInput,
                _ => ErrorClassification::Fatal,
            }
        }
        ProviderError::Api {
            kind,
            code,
            message,
            ..
        } => {
            if contains_marker(code.as_deref(), QUOTA_MARKERS)
                || contains_marker(kind.as_deref(), QUOTA_MARKERS)
            {
                ErrorClassification::QuotaExceeded
            } else if contains_marker(code.as_deref(), AUTH_MARKERS)
                || contains_marker(kind.as_deref(), AUTH_MARKERS)
                || contains_marker(Some(message), AUTH_MARKERS)
            {
                ErrorClassification::Authentication
            } else if matches!(kind.as_deref(), Some("server_error")) {
                ErrorClassification::Transient
            } else if matches!(kind.as_deref(), Some("invalid_request_error")) {
                ErrorClassification::InvalidInput
            } else {
                ErrorClassification::Fatal
            }
        }
    }
}
