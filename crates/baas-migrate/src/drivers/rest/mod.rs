//! REST driver for a live backend project.
//!
//! - [`RestQueryClient`]: table access through `/rest/v1`
//! - [`RestStorageClient`]: object storage through `/storage/v1`
//!
//! Both send the project key as `apikey` and as a bearer token, the way the
//! backend's own SDK does.

mod query;
mod storage;

pub use query::RestQueryClient;
pub use storage::RestStorageClient;

use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{MigrateError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by a driver instance.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("baas-migrate/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Parse a project base URL.
pub(crate) fn parse_base_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| MigrateError::Config(format!("invalid project url '{}': {}", url, e)))?;
    if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(MigrateError::Config(format!(
            "project url must be an http(s) URL, got '{}'",
            url
        )));
    }
    Ok(parsed)
}

/// `base` with extra path segments appended (each one percent-encoded).
pub(crate) fn endpoint_url<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| MigrateError::Config(format!("cannot extend url '{}'", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Attach project credentials to a request.
pub(crate) fn authorize(request: RequestBuilder, key: &str) -> RequestBuilder {
    request.header("apikey", key).bearer_auth(key)
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Pass through successful responses; turn anything else into [`MigrateError::Remote`].
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => {
            let mut parts: Vec<String> = [parsed.error, parsed.message, parsed.details]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect();
            parts.dedup();
            if parts.is_empty() {
                body
            } else {
                parts.join(": ")
            }
        }
        Err(_) if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body,
    };

    Err(MigrateError::remote(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://abc.example.co").is_ok());
        assert!(parse_base_url("  http://localhost:54321 ").is_ok());
        assert!(matches!(parse_base_url("not a url"), Err(MigrateError::Config(_))));
        assert!(matches!(parse_base_url("ftp://abc.example.co"), Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_endpoint_url_encodes_segments() {
        let base = parse_base_url("https://abc.example.co/").unwrap();
        let url = endpoint_url(&base, ["storage", "v1", "object", "images", "casa nova.jpg"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.example.co/storage/v1/object/images/casa%20nova.jpg"
        );

        let nested = parse_base_url("https://proxy.example.co/project").unwrap();
        let url = endpoint_url(&nested, ["rest", "v1", "categories"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.co/project/rest/v1/categories");
    }
}
