//! Request executor with bearer auth and a single refresh-and-retry.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use crate::core::request::RequestEnvelope;
use crate::core::{ApiRequest, HttpResponse, HttpTransport};
use crate::error::{create_error_from_response, NetworkError, OneDriveResult, TokenError};
use crate::telemetry::redact::{redact_body, redact_headers};
use crate::token::{TokenExchanger, TokenLease, TokenStore};

/// Per-call behaviour.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Attach `Authorization: Bearer <token>`.
    pub requires_auth: bool,
    /// On 401, refresh the token and send once more.
    pub allow_refresh: bool,
    /// Timeout for each attempt. Falls back to the configured timeout.
    pub timeout: Option<Duration>,
    /// Abandons the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            requires_auth: true,
            allow_refresh: true,
            timeout: None,
            cancel: None,
        }
    }
}

impl CallOptions {
    /// Unauthenticated call: no bearer header, no refresh.
    pub fn anonymous() -> Self {
        Self {
            requires_auth: false,
            allow_refresh: false,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.allow_refresh = false;
        self
    }
}

/// Decoded response, with the raw parts kept for diagnostics.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub data: T,
}

/// Executes API requests with the stored token.
///
/// A 401 triggers one refresh through the [`TokenStore`] and one re-send of
/// the same captured request. Nothing else is retried.
pub struct AuthenticatedTransport {
    transport: Arc<dyn HttpTransport>,
    store: Arc<TokenStore>,
    exchanger: Arc<dyn TokenExchanger>,
    base_url: Url,
    default_timeout: Duration,
}

impl AuthenticatedTransport {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<TokenStore>,
        exchanger: Arc<dyn TokenExchanger>,
        base_url: Url,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            exchanger,
            base_url,
            default_timeout,
        }
    }

    pub(crate) fn set_store(&mut self, store: Arc<TokenStore>) {
        self.store = store;
    }

    /// Execute and decode a JSON response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: CallOptions,
    ) -> OneDriveResult<ApiResponse<T>> {
        let response = self.call_raw(request, options).await?;
        let data = response.json::<T>()?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
            data,
        })
    }

    /// Execute and return the response without decoding it.
    #[instrument(skip_all, fields(method = %request.method(), target = %request.target()))]
    pub async fn call_raw(
        &self,
        request: ApiRequest,
        options: CallOptions,
    ) -> OneDriveResult<HttpResponse> {
        let envelope = RequestEnvelope::capture(request, &self.base_url)?;

        match options.cancel.clone() {
            Some(cancel) => tokio::select! {
                result = self.execute(&envelope, &options) => result,
                _ = cancel.cancelled() => Err(NetworkError::Cancelled.into()),
            },
            None => self.execute(&envelope, &options).await,
        }
    }

    async fn execute(
        &self,
        envelope: &RequestEnvelope,
        options: &CallOptions,
    ) -> OneDriveResult<HttpResponse> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let mut lease: Option<TokenLease> = if options.requires_auth {
            Some(self.store.lease().await.ok_or(TokenError::Unauthenticated)?)
        } else {
            None
        };
        let mut may_refresh = options.requires_auth && options.allow_refresh;

        loop {
            let bearer = lease.as_ref().map(|l| l.access_token.as_str());
            let request = envelope.to_request(bearer, Some(timeout))?;

            debug!(
                method = %request.method,
                url = %request.url,
                headers = ?redact_headers(&request.headers),
                body = %request.body.as_deref().map(redact_body).unwrap_or_default(),
                "Sending request"
            );

            let response = self.transport.send(request).await?;

            debug!(
                status = response.status,
                headers = ?redact_headers(&response.headers),
                body = %redact_body(&response.body),
                "Received response"
            );

            if response.status == 401 && may_refresh {
                if let Some(current) = lease.take() {
                    info!(epoch = current.epoch, "Access token rejected, refreshing");
                    lease = Some(
                        self.store
                            .refresh(current.epoch, Arc::clone(&self.exchanger))
                            .await?,
                    );
                    may_refresh = false;
                    continue;
                }
            }

            if !response.is_success() {
                return Err(create_error_from_response(response.status, &response.text()));
            }
            return Ok(response);
        }
    }
}
