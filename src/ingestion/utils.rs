//! Utility functions for common operations

use crate::error::FetchError;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Shared HTTP client. No timeout is set; reqwest defaults apply.
pub fn build_http_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::request("HTTP client", e))
}

/// Send a prepared GET request and decode its JSON body
pub async fn http_get_json(
    request: RequestBuilder,
    source_name: &'static str,
) -> Result<Value, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::request(source_name, e))?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status {
            source_name,
            status,
        });
    }

    let body = response.json::<Value>().await.map_err(|e| {
        if e.is_decode() {
            FetchError::malformed(source_name, e.without_url())
        } else {
            FetchError::request(source_name, e)
        }
    })?;
    debug!("Received {} response ({})", source_name, status);
    Ok(body)
}

/// Append path segments to a base URL. Each segment is percent-encoded, so
/// ticker symbols and currency codes cannot break out of their segment.
pub fn endpoint_url(
    base: &str,
    segments: &[&str],
    source_name: &'static str,
) -> Result<Url, FetchError> {
    let invalid = || FetchError::InvalidEndpoint {
        source_name,
        url: base.to_string(),
    };

    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
