//! HTTP helpers for source fetchers.
//!
//! All fetchers go through [`send_json`] rather than calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets the
//! same failure classification: connection errors, timeouts and
//! non-success statuses are [`FetchError::Transfer`], unparseable bodies
//! are [`FetchError::Decode`].
//!
//! There is no retry here. A failed source is abandoned and the loader
//! moves on to the next source in the layer's priority list.

use crate::FetchError;

/// Maximum length of the response body preview included in logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`FetchError::Transfer`] if the request fails, times out, or
/// the server returns a non-success status, and [`FetchError::Decode`]
/// if the body is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, FetchError> {
    let response = request.send().await?;

    let url = response.url().to_string();
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    log::debug!("  {status} {url} ({content_type:?})");

    if !status.is_success() {
        return Err(FetchError::Transfer {
            message: format!("HTTP {status} from {url}"),
        });
    }

    // Read the raw body as text first so a parse failure can log what
    // actually came back.
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|json_err| {
        log::warn!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        FetchError::Decode {
            message: format!(
                "JSON parse failed: {json_err} (status={status}, received {} bytes, \
                 content-type={content_type:?})",
                text.len()
            ),
        }
    })
}

/// Returns at most [`BODY_PREVIEW_LEN`] bytes of `text`, cut on a char
/// boundary.
fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
