//! Token Exchanger
//!
//! Authorization-code and refresh-token grants against the token endpoint.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::core::{lock, HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, NetworkError, OneDriveError, OneDriveResult, ProtocolError};
use crate::telemetry::redact::{redact_body, redact_headers};
use crate::types::{ClientAuthMethod, Credentials, GrantType, TokenData};

/// Token endpoint interface (for dependency injection).
///
/// Implementations never touch the token store; the caller decides what to
/// do with the returned tokens.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Trade an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> OneDriveResult<TokenData>;

    /// Trade a refresh token for new tokens.
    async fn refresh(&self, refresh_token: &str) -> OneDriveResult<TokenData>;
}

/// Token exchanger that POSTs forms over an [`HttpTransport`].
pub struct HttpTokenExchanger {
    credentials: Credentials,
    token_endpoint: Url,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl HttpTokenExchanger {
    pub fn new(
        credentials: Credentials,
        token_endpoint: Url,
        transport: Arc<dyn HttpTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            token_endpoint,
            transport,
            timeout,
        }
    }

    /// Form fields for a grant. `client_id`, `scope` and `redirect_uri`
    /// accompany every grant.
    fn build_form(&self, grant: GrantType, grant_field: (&str, &str)) -> Vec<(String, String)> {
        let creds = &self.credentials;
        let mut params = vec![
            ("client_id".to_string(), creds.client_id.clone()),
            ("scope".to_string(), creds.scope_string()),
            (grant_field.0.to_string(), grant_field.1.to_string()),
            ("redirect_uri".to_string(), creds.redirect_uri.to_string()),
            ("grant_type".to_string(), grant.as_str().to_string()),
        ];

        if creds.auth_method == ClientAuthMethod::ClientSecretPost {
            params.push((
                "client_secret".to_string(),
                creds.client_secret.expose_secret().to_string(),
            ));
        }

        params
    }

    fn build_headers(&self) -> OneDriveResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if self.credentials.auth_method == ClientAuthMethod::ClientSecretBasic {
            let raw = format!(
                "{}:{}",
                self.credentials.client_id,
                self.credentials.client_secret.expose_secret()
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
            let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|e| {
                ProtocolError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                    message: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    async fn post_form(&self, form: Vec<(String, String)>) -> OneDriveResult<TokenData> {
        let body = serde_urlencoded::to_string(&form).map_err(|e| {
            OneDriveError::from(ProtocolError::InvalidResponse {
                message: format!("could not encode token form: {e}"),
            })
        })?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_endpoint.clone(),
            headers: self.build_headers()?,
            body: Some(Bytes::from(body)),
            timeout: Some(self.timeout),
        };

        debug!(
            url = %request.url,
            headers = ?redact_headers(&request.headers),
            body = %request.body.as_deref().map(redact_body).unwrap_or_default(),
            "Token endpoint request"
        );

        let response = self.transport.send(request).await?;

        debug!(
            status = response.status,
            body = %redact_body(&response.body),
            "Token endpoint response"
        );

        if (300..400).contains(&response.status) {
            let location = response
                .headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            warn!(status = response.status, %location, "Token endpoint redirected");
            return Err(ProtocolError::UnexpectedRedirect { location }.into());
        }

        if !response.is_success() {
            warn!(status = response.status, "Token endpoint rejected the grant");
            return Err(create_error_from_response(response.status, &response.text()));
        }

        response.json::<TokenData>()
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    #[instrument(skip_all, fields(endpoint = %self.token_endpoint))]
    async fn exchange_code(&self, code: &str) -> OneDriveResult<TokenData> {
        let form = self.build_form(GrantType::AuthorizationCode, ("code", code));
        self.post_form(form).await
    }

    #[instrument(skip_all, fields(endpoint = %self.token_endpoint))]
    async fn refresh(&self, refresh_token: &str) -> OneDriveResult<TokenData> {
        let form = self.build_form(GrantType::RefreshToken, ("refresh_token", refresh_token));
        self.post_form(form).await
    }
}

/// Mock token exchanger for testing.
///
/// Records every call. Queued results are returned in order; when the queue
/// is empty a network error is returned.
#[derive(Default)]
pub struct MockTokenExchanger {
    exchange_results: Mutex<VecDeque<OneDriveResult<TokenData>>>,
    refresh_results: Mutex<VecDeque<OneDriveResult<TokenData>>>,
    exchange_history: Mutex<Vec<String>>,
    refresh_history: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTokenExchanger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_exchange(&self, result: OneDriveResult<TokenData>) -> &Self {
        lock(&self.exchange_results).push_back(result);
        self
    }

    pub fn queue_refresh(&self, result: OneDriveResult<TokenData>) -> &Self {
        lock(&self.refresh_results).push_back(result);
        self
    }

    /// Make every call take at least `delay`.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    /// Codes passed to `exchange_code`.
    pub fn get_exchange_history(&self) -> Vec<String> {
        lock(&self.exchange_history).clone()
    }

    /// Refresh tokens passed to `refresh`.
    pub fn get_refresh_history(&self) -> Vec<String> {
        lock(&self.refresh_history).clone()
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn exhausted() -> OneDriveError {
        NetworkError::ConnectionFailed {
            message: "No mock token result available".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl TokenExchanger for MockTokenExchanger {
    async fn exchange_code(&self, code: &str) -> OneDriveResult<TokenData> {
        lock(&self.exchange_history).push(code.to_string());
        self.pause().await;
        let next = lock(&self.exchange_results).pop_front();
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn refresh(&self, refresh_token: &str) -> OneDriveResult<TokenData> {
        lock(&self.refresh_history).push(refresh_token.to_string());
        self.pause().await;
        let next = lock(&self.refresh_results).pop_front();
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }
}
