//! HTTP Transport
//!
//! HTTP client interface and implementations for token and API requests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::core::lock;
use crate::error::{ConfigurationError, NetworkError, OneDriveError, OneDriveResult, ProtocolError};

/// HTTP request definition.
///
/// The body is an immutable `Bytes` buffer, so cloning a request shares the
/// same bytes instead of copying them.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Bytes>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> OneDriveResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ProtocolError::InvalidJson {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request. An `Err` means no response was received.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OneDriveError>;
}

/// Largest response body accepted by default (16 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Default reqwest-based HTTP transport.
///
/// Redirects are never followed: a 3xx comes back as a response, so the
/// `Authorization` header and token forms stay with the host they were
/// addressed to.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create transport with the given default timeout.
    pub fn new(timeout: Duration) -> OneDriveResult<Self> {
        Self::with_options(timeout, DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create transport with custom options.
    pub fn with_options(timeout: Duration, max_response_size: usize) -> OneDriveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_size,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OneDriveError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = self
            .client
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                OneDriveError::Network(NetworkError::Timeout { timeout })
            } else {
                OneDriveError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if let Some(size) = response.content_length() {
            if size > self.max_response_size as u64 {
                return Err(ProtocolError::ResponseTooLarge {
                    size: usize::try_from(size).unwrap_or(usize::MAX),
                    limit: self.max_response_size,
                }
                .into());
            }
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                OneDriveError::Network(NetworkError::Timeout { timeout })
            } else {
                OneDriveError::Network(NetworkError::ConnectionFailed {
                    message: format!("failed reading response body: {e}"),
                })
            }
        })?;

        if body.len() > self.max_response_size {
            return Err(ProtocolError::ResponseTooLarge {
                size: body.len(),
                limit: self.max_response_size,
            }
            .into());
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing.
///
/// Responses are returned in the order they were queued.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<OneDriveResult<HttpResponse>>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        lock(&self.responses).push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn queue_error(&self, error: OneDriveError) -> &Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let response = HttpResponse {
            status,
            headers,
            body: serde_json::to_vec(body).map(Bytes::from).unwrap_or_default(),
        };
        self.queue_response(response)
    }

    /// Queue a response with an empty body.
    pub fn queue_status(&self, status: u16) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *lock(&self.default_response) = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        lock(&self.request_history).clone()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        lock(&self.request_history).last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OneDriveError> {
        lock(&self.request_history).push(request);

        let queued = lock(&self.responses).pop_front();
        match queued {
            Some(result) => result,
            None => lock(&self.default_response).clone().ok_or_else(|| {
                OneDriveError::Network(NetworkError::ConnectionFailed {
                    message: "No mock response available".to_string(),
                })
            }),
        }
    }
}

/// Parse a header pair, reporting which header was malformed.
pub(crate) fn header_pair(
    name: &str,
    value: &str,
) -> OneDriveResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        ProtocolError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        }
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| ProtocolError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok((header_name, header_value))
}
