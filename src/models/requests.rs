//! Request DTOs for the page cache API
//!
//! Defines the query strings accepted by the HTTP endpoints.

use reqwest::Url;
use serde::Deserialize;

/// Query string for `GET /page` and `GET /count`
///
/// # Fields
/// - `url`: The absolute http(s) URL to fetch or report on
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    /// The page URL, used verbatim as the cache key
    pub url: String,
}

impl PageQuery {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            return Some("url cannot be empty".to_string());
        }
        match Url::parse(&self.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
            Ok(parsed) => Some(format!("unsupported url scheme '{}'", parsed.scheme())),
            Err(err) => Some(format!("invalid url: {}", err)),
        }
    }
}
