//! HTTP send helpers with optional retry.
//!
//! Fetchers call [`send_json`] or [`send_text`] instead of
//! `reqwest::RequestBuilder::send()` directly, so status handling, body
//! logging, and retry behaviour are the same for every upstream.
//!
//! ```ignore
//! use zcta_source::retry;
//!
//! let body = retry::send_json(|| client.get(&url).query(&params), settings.max_retries).await?;
//! let csv = retry::send_text(|| client.get(&url), settings.max_retries).await?;
//! ```
//!
//! With `max_retries == 0` (the default) the first failure is returned.

use std::time::Duration;

use crate::{SourceError, truncate_for_log};

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// `build_request` is called on each attempt to construct a fresh
/// [`reqwest::RequestBuilder`], since builders are consumed by `.send()`.
///
/// Transient failures (connection errors, timeouts, HTTP 429, HTTP 5xx,
/// and bodies that fail to decode) are retried up to `max_retries` times
/// with exponential backoff. HTTP 4xx other than 429 is permanent.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries,
/// the server returns a non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    max_retries: u32,
) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let text = send_text_once(&build_request, &mut attempt, max_retries).await?;
        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                let delay = backoff(attempt);
                log::warn!(
                    "JSON parse failed ({e}), re-fetching in {delay:?} \
                     (retry {attempt}/{max_retries}). Body: {}",
                    truncate_for_log(&text, BODY_PREVIEW_LEN)
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!(
                    "JSON parse failed: {e}. Received {} bytes: {}",
                    text.len(),
                    truncate_for_log(&text, BODY_PREVIEW_LEN)
                );
                return Err(SourceError::Json(e));
            }
        }
    }
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// Same retry rules as [`send_json`]; used for CSV downloads.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F, max_retries: u32) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    send_text_once(&build_request, &mut attempt, max_retries).await
}

/// Sends until a successful status and readable body arrive, advancing
/// `attempt` for every retry spent.
#[allow(clippy::future_not_send)]
async fn send_text_once<F>(
    build_request: &F,
    attempt: &mut u32,
    max_retries: u32,
) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    loop {
        let failure = match build_request().send().await {
            Err(e) => {
                if !is_transient(&e) {
                    return Err(SourceError::Http(e));
                }
                SourceError::Http(e)
            }
            Ok(response) => {
                let status = response.status();
                let url = response.url().to_string();

                if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SourceError::Response {
                        message: format!(
                            "HTTP {status} from {url}: {}",
                            truncate_for_log(&body, BODY_PREVIEW_LEN)
                        ),
                    });
                }

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    SourceError::Response {
                        message: format!("HTTP {status} from {url}"),
                    }
                } else {
                    match response.text().await {
                        Ok(text) => return Ok(text),
                        Err(e) => SourceError::Http(e),
                    }
                }
            }
        };

        if *attempt >= max_retries {
            if max_retries > 0 {
                log::error!("Giving up after {max_retries} retries: {failure}");
            }
            return Err(failure);
        }

        *attempt += 1;
        let delay = backoff(*attempt);
        log::warn!("  {failure}; retry {attempt}/{max_retries} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// Exponential backoff: 2s, 4s, 8s, ... capped at 64s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
