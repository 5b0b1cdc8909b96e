//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest` with standardized
//! response handling. Requests are not retried here: the snapshot schedule
//! owns the retry policy, and the feed must fail fast.

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

use crate::error::{CrawlerError, CrawlerResult};

/// Browser-like user agent; the site serves reduced pages to unknown agents.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

/// A standardized container for API responses.
///
/// Wraps the decoded body along with the status and headers of the
/// transaction. A non-success status is still an `Ok(ApiResponse)`.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The decoded body, present only for successful responses.
    pub data: Option<T>,
    /// The raw body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client bound to a base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The underlying client. Cloning shares the connection pool.
    inner: reqwest::Client,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient` for `base_url`.
    ///
    /// # Errors
    /// Returns `CrawlerError::InvalidUrl` if `base_url` is not absolute, or
    /// `CrawlerError::Transport` if the TLS backend cannot be initialised.
    pub fn new(base_url: &str) -> CrawlerResult<Self> {
        let url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            base_url: url,
        })
    }

    /// The base URL every path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GETs `path` and decodes a successful body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CrawlerResult<ApiResponse<T>> {
        let response = self.send(Method::GET, path).await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers,
            })
        }
    }

    /// GETs `path` and returns the raw body regardless of status.
    ///
    /// `data` carries the body for successful responses, `error_body` for the rest.
    pub async fn get_text(&self, path: &str) -> CrawlerResult<ApiResponse<String>> {
        let full_url = self.base_url.join(path)?;
        self.get_text_url(full_url).await
    }

    /// Same as [`ApiClient::get_text`] for an already built URL.
    pub async fn get_text_url(&self, url: Url) -> CrawlerResult<ApiResponse<String>> {
        let response = self.inner.request(Method::GET, url).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let success = status.is_success();

        Ok(ApiResponse {
            data: success.then(|| body.clone()),
            error_body: (!success).then_some(body),
            status: status.as_u16(),
            success,
            headers,
        })
    }

    /// The base URL with `segment` appended as one percent-encoded path
    /// segment. Query and fragment of the base are dropped.
    pub fn segment_url(&self, segment: &str) -> CrawlerResult<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| CrawlerError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn send(&self, method: Method, path: &str) -> CrawlerResult<reqwest::Response> {
        let full_url = self.base_url.join(path)?;
        // Redirects are followed by reqwest's default policy.
        let response = self.inner.request(method, full_url).send().await?;
        Ok(response)
    }
}
