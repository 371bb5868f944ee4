//! Input rules shared by the create and update handlers.

use url::Url;

use crate::error::ValidationError;

pub const MAX_KEY_LENGTH: usize = 50;
pub const MAX_URL_LENGTH: usize = 2048;

/// Validate a link key, returning it trimmed of surrounding whitespace.
pub fn key(raw: &str) -> Result<&str, ValidationError> {
    let key = raw.trim();

    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(ValidationError::KeyTooLong {
            max: MAX_KEY_LENGTH,
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidKey);
    }

    Ok(key)
}

/// Validate a destination URL, returning it trimmed. The parsed scheme must be
/// exactly `http` or `https`. Control characters are refused outright: the URL
/// parser drops embedded tabs and newlines, and the raw string is what gets
/// stored.
pub fn destination(raw: &str) -> Result<&str, ValidationError> {
    let url = raw.trim();

    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if url.chars().count() > MAX_URL_LENGTH {
        return Err(ValidationError::UrlTooLong {
            max: MAX_URL_LENGTH,
        });
    }

    if url.chars().any(char::is_control) {
        return Err(ValidationError::InvalidUrl);
    }

    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
        _ => Err(ValidationError::InvalidUrl),
    }
}
