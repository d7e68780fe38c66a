use crate::domain::job::JobOptions;
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// ISO 639-1 language codes the adapters have default voices for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 6] = [
        LanguageCode::English,
        LanguageCode::Spanish,
        LanguageCode::French,
        LanguageCode::German,
        LanguageCode::Italian,
        LanguageCode::Portuguese,
    ];

    /// Get the ISO 639-1 code as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Spanish => "es",
            LanguageCode::French => "fr",
            LanguageCode::German => "de",
            LanguageCode::Italian => "it",
            LanguageCode::Portuguese => "pt",
        }
    }

    /// Parse an ISO code, tolerating region suffixes such as `en-GB`
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code.trim().split(['-', '_']).next()?.to_lowercase();
        match primary.as_str() {
            "en" => Some(LanguageCode::English),
            "es" => Some(LanguageCode::Spanish),
            "fr" => Some(LanguageCode::French),
            "de" => Some(LanguageCode::German),
            "it" => Some(LanguageCode::Italian),
            "pt" => Some(LanguageCode::Portuguese),
            _ => None,
        }
    }

    /// Convert lingua Language to LanguageCode
    pub fn from_lingua(language: Language) -> Self {
        match language {
            Language::English => LanguageCode::English,
            Language::Spanish => LanguageCode::Spanish,
            Language::French => LanguageCode::French,
            Language::German => LanguageCode::German,
            Language::Italian => LanguageCode::Italian,
            Language::Portuguese => LanguageCode::Portuguese,
        }
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn detector() -> &'static LanguageDetector {
    static DETECTOR: OnceLock<LanguageDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| {
        let languages = [
            Language::English,
            Language::Spanish,
            Language::French,
            Language::German,
            Language::Italian,
            Language::Portuguese,
        ];
        LanguageDetectorBuilder::from_languages(&languages).build()
    })
}

/// Detect the language of the given text, defaulting to English
pub fn detect_language(text: &str) -> LanguageCode {
    match detector().detect_language_of(text) {
        Some(language) => LanguageCode::from_lingua(language),
        None => {
            tracing::debug!("Could not detect language, falling back to English");
            LanguageCode::English
        }
    }
}

/// Language hint from the job options, else detected from the text
pub fn resolve_language(text: &str, options: &JobOptions) -> LanguageCode {
    options
        .language()
        .and_then(LanguageCode::from_code)
        .unwrap_or_else(|| detect_language(text))
}
