#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared plumbing for every upstream data fetcher.
//!
//! Holds the HTTP client settings, the [`retry`] helpers that every
//! request goes through, and the [`progress`] trait used to report
//! per-item progress from long-running fetches.

pub mod progress;
pub mod retry;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout. TIGERweb geometry pages and the Overpass
/// polygon queries for large ZCTAs regularly take over a minute.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; zcta-commute/0.1; +https://github.com/BSteffaniak/zcta-commute)";

/// Errors that can occur while talking to an upstream service.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered, but not with something usable.
    #[error("Bad response: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}

/// HTTP behaviour shared by all fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures (timeouts, 429, 5xx). `0` means a
    /// failed request fails the call immediately.
    pub max_retries: u32,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    /// The configured timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds a `reqwest::Client` using these settings.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be built.
    pub fn build_client(&self) -> Result<reqwest::Client, SourceError> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout())
            .build()
            .map_err(Into::into)
    }
}

/// Truncates a string for logging, appending "..." if it exceeds
/// `max_len` characters.
#[must_use]
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = HttpSettings::default();
        assert_eq!(settings.timeout(), Duration::from_secs(180));
        assert_eq!(settings.max_retries, 0);
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: HttpSettings = serde_json::from_str(r#"{"max_retries": 3}"#).unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn truncates_long_strings() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("abc", 3), "abc");
        assert_eq!(truncate_for_log("ééé", 2), "éé...");
    }
}
