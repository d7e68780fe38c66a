use crate::domain::tts::{AudioFormat, ProviderId};
use regex::Regex;
use std::sync::OnceLock;

/// UTF-8 budget for the stem and for the voice part of an output name.
///
/// Two of these plus provider, separators, a duplicate suffix and the
/// extension stay below the common 255-byte `NAME_MAX`.
pub const MAX_FILE_STEM_BYTES: usize = 100;

const FALLBACK_STEM: &str = "untitled";

const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a", ".flac"];

/// Device names Windows refuses as file names regardless of extension
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn disallowed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{L}\p{N}_-]+").expect("valid filename pattern"))
}

/// Reduce a user-supplied name to a safe file stem.
///
/// Only letters, digits, `_` and `-` survive; every other run of characters
/// (path separators, dots, control characters, spaces) collapses into a
/// single `_`. A trailing audio extension is dropped first.
pub fn sanitize_file_stem(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_extension = AUDIO_EXTENSIONS
        .iter()
        .find_map(|ext| {
            let split = trimmed.len().checked_sub(ext.len())?;
            let tail = trimmed.get(split..)?;
            tail.eq_ignore_ascii_case(ext).then(|| &trimmed[..split])
        })
        .unwrap_or(trimmed);

    let replaced = disallowed_pattern().replace_all(without_extension, "_");
    let mut stem = truncate_to_bytes(replaced.trim_matches(|c| c == '_' || c == '-'), MAX_FILE_STEM_BYTES)
        .to_string();

    // Truncation can leave a dangling separator
    while stem.ends_with('_') || stem.ends_with('-') {
        stem.pop();
    }

    if stem.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    if RESERVED_NAMES.contains(&stem.to_lowercase().as_str()) {
        stem.push_str("_file");
    }

    stem
}

/// Longest prefix of `value` within `max_bytes` that ends on a char boundary
fn truncate_to_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// `{stem}_{provider}_{voice}.{ext}`
pub fn output_file_name(stem: &str, provider: ProviderId, voice: &str, format: AudioFormat) -> String {
    let voice = sanitize_file_stem(voice);
    format!("{}_{}_{}.{}", stem, provider.as_str(), voice, format.extension())
}
