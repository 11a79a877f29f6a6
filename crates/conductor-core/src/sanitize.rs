//! Content sanitization at the edge of the core.
//!
//! Every string that enters the data model passes through here once;
//! internal code may then assume message content is NFC-normalized, free of
//! raw control characters, bounded in length, and free of the rejected
//! injection patterns.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Maximum message content length in Unicode code points.
pub const MAX_CONTENT_CODE_POINTS: usize = 50_000;

/// Marker appended when content is truncated at the length cap.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// Content rejected by the sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("content contains a disallowed pattern: {0:?}")]
    SuspiciousPattern(String),
}

static SUSPICIOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<script|javascript:|\bon\w+\s*=|eval\(|exec\(")
        .expect("suspicious-pattern regex is valid")
});

/// Normalize and validate message content.
///
/// NFC-normalizes, strips control characters U+0000–U+001F except
/// `\t \n \r`, rejects injection-shaped content, and truncates anything
/// longer than [`MAX_CONTENT_CODE_POINTS`] with [`TRUNCATION_MARKER`].
pub fn sanitize_content(raw: &str) -> Result<String, ContentError> {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.nfc() {
        match ch {
            '\t' | '\n' | '\r' => cleaned.push(ch),
            c if (c as u32) < 0x20 => {}
            c => cleaned.push(c),
        }
    }

    if let Some(found) = SUSPICIOUS.find(&cleaned) {
        return Err(ContentError::SuspiciousPattern(found.as_str().to_string()));
    }

    if cleaned.chars().count() > MAX_CONTENT_CODE_POINTS {
        let mut truncated: String = cleaned.chars().take(MAX_CONTENT_CODE_POINTS).collect();
        truncated.push_str(TRUNCATION_MARKER);
        return Ok(truncated);
    }

    Ok(cleaned)
}
