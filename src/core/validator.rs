//! URL validation and domain labelling

use crate::error::{StoryError, StoryResult};
use std::fmt;
use url::Url;

/// Label used in prompts when no host can be extracted
pub const FALLBACK_LABEL: &str = "website";

/// An absolute URL with both a scheme and a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUrl {
    source: String,
    parsed: Url,
}

impl ValidUrl {
    /// The decoded URL as submitted
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }

    pub fn label(&self) -> String {
        extract_label(self.parsed.as_str())
    }
}

impl fmt::Display for ValidUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Decode a possibly percent-encoded URL parameter and check it is absolute.
pub fn validate(raw_url: Option<&str>) -> StoryResult<ValidUrl> {
    let raw = raw_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoryError::InvalidUrl("URL parameter is required".to_string()))?;

    let decoded = urlencoding::decode(raw)
        .map_err(|e| {
            StoryError::InvalidUrl(format!("'{}' is not valid percent-encoding: {}", raw, e))
        })?
        .trim()
        .to_string();

    let parsed = Url::parse(&decoded).map_err(|e| {
        StoryError::InvalidUrl(format!(
            "Invalid URL format '{}': {}. Please provide a valid URL.",
            decoded, e
        ))
    })?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(StoryError::InvalidUrl(format!(
            "URL '{}' has no host. Please provide a valid URL.",
            decoded
        )));
    }

    tracing::debug!("[Validator] Accepted URL {}", decoded);

    Ok(ValidUrl {
        source: decoded,
        parsed,
    })
}

/// Host component of `url`, or [`FALLBACK_LABEL`]. Never fails.
pub fn extract_label(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}
