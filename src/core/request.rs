//! API Requests
//!
//! Caller-facing request builder and the replayable envelope the executor
//! sends from.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::core::transport::{header_pair, HttpMethod, HttpRequest};
use crate::error::{ConfigurationError, OneDriveResult, ProtocolError};

/// A call against the API.
///
/// `target` is either a path relative to the configured API base URL
/// (`"me/drive/root/children"`) or an absolute URL.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: HttpMethod,
    target: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, target)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: &str) -> OneDriveResult<Self> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> OneDriveResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Raw payload. The caller sets the content type.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// A request with its body captured once.
///
/// Every attempt gets its own `HttpRequest` built from the same immutable
/// buffer, so a retry sends byte-identical content.
#[derive(Clone, Debug)]
pub(crate) struct RequestEnvelope {
    pub(crate) method: HttpMethod,
    pub(crate) url: Url,
    headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl RequestEnvelope {
    /// Resolve the target against `base` and freeze the request.
    pub(crate) fn capture(request: ApiRequest, base: &Url) -> OneDriveResult<Self> {
        let mut url = resolve_url(base, &request.target)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(Self {
            method: request.method,
            url,
            headers: request.headers,
            body: request.body,
        })
    }

    /// Fresh view of the envelope for one attempt.
    pub(crate) fn to_request(
        &self,
        bearer: Option<&str>,
        timeout: Option<Duration>,
    ) -> OneDriveResult<HttpRequest> {
        let mut headers = self.headers.clone();
        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ProtocolError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                    message: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
            timeout,
        })
    }
}

fn resolve_url(base: &Url, target: &str) -> OneDriveResult<Url> {
    let resolved = if target.contains("://") {
        Url::parse(target)
    } else {
        base.join(target.trim_start_matches('/'))
    };
    resolved.map_err(|e| {
        ConfigurationError::InvalidEndpoint {
            url: target.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
