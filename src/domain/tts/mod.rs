pub mod classification;
pub mod error;
pub mod language;
pub mod provider;
pub mod retry;

pub use classification::{classify, ErrorClassification};
pub use error::ProviderError;
pub use language::{detect_language, resolve_language, LanguageCode};
pub use provider::{preflight, AudioFormat, ProviderId, Voice, VoiceSynthesisProvider};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy};
