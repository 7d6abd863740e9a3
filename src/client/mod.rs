//! OneDrive Client
//!
//! High-level client combining the browser login with the authenticated
//! transport.

pub mod executor;

pub use executor::{ApiResponse, AuthenticatedTransport, CallOptions};

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{
    ApiRequest, HttpResponse, HttpTransport, OsRngStateGenerator, ReqwestHttpTransport,
    StateGenerator,
};
use crate::error::{OneDriveResult, ProtocolError};
use crate::flows::{AuthorizationCodeFlow, AuthorizationPrompt, ConsolePrompt};
use crate::render::{HtmlPageRenderer, PageRenderer};
use crate::services::{CurrentUser, UsersService};
use crate::token::{HttpTokenExchanger, TokenExchanger, TokenStore};
use crate::types::{OneDriveConfig, TokenData};

/// Pluggable collaborators for [`OneDriveClient::with_components`].
pub struct ClientComponents {
    pub transport: Arc<dyn HttpTransport>,
    /// Defaults to an [`HttpTokenExchanger`] over `transport`.
    pub exchanger: Option<Arc<dyn TokenExchanger>>,
    pub state_generator: Arc<dyn StateGenerator>,
    pub renderer: Arc<dyn PageRenderer>,
    pub prompt: Arc<dyn AuthorizationPrompt>,
}

impl ClientComponents {
    /// Default collaborators over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            exchanger: None,
            state_generator: Arc::new(OsRngStateGenerator),
            renderer: Arc::new(HtmlPageRenderer::default()),
            prompt: Arc::new(ConsolePrompt),
        }
    }

    pub fn exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
        self.exchanger = Some(exchanger);
        self
    }

    pub fn state_generator(mut self, generator: Arc<dyn StateGenerator>) -> Self {
        self.state_generator = generator;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn prompt(mut self, prompt: Arc<dyn AuthorizationPrompt>) -> Self {
        self.prompt = prompt;
        self
    }
}

/// Client for OneDrive / Microsoft Graph.
pub struct OneDriveClient {
    config: OneDriveConfig,
    store: Arc<TokenStore>,
    flow: AuthorizationCodeFlow,
    executor: AuthenticatedTransport,
}

impl OneDriveClient {
    /// Create a client with the default reqwest transport.
    pub fn new(config: OneDriveConfig) -> OneDriveResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::new(config.timeout)?);
        Ok(Self::with_components(config, ClientComponents::new(transport)))
    }

    /// Create a client with custom implementations.
    pub fn with_components(config: OneDriveConfig, components: ClientComponents) -> Self {
        let exchanger: Arc<dyn TokenExchanger> = match components.exchanger {
            Some(exchanger) => exchanger,
            None => Arc::new(HttpTokenExchanger::new(
                config.credentials.clone(),
                config.provider.token_endpoint.clone(),
                components.transport.clone(),
                config.timeout,
            )),
        };
        let store = Arc::new(TokenStore::new(config.refresh_policy));

        let flow = AuthorizationCodeFlow::new(
            config.clone(),
            exchanger.clone(),
            components.state_generator,
            components.renderer,
            components.prompt,
        );
        let executor = AuthenticatedTransport::new(
            components.transport,
            store.clone(),
            exchanger,
            config.api_base_url.clone(),
            config.timeout,
        );

        Self {
            config,
            store,
            flow,
            executor,
        }
    }

    /// Start from previously obtained tokens instead of a browser login.
    pub fn with_token(mut self, token: TokenData) -> Self {
        self.store = Arc::new(TokenStore::with_token(self.config.refresh_policy, token));
        self.executor.set_store(self.store.clone());
        self
    }

    pub fn config(&self) -> &OneDriveConfig {
        &self.config
    }

    /// Run the browser login and store the resulting tokens.
    pub async fn authenticate(&self) -> OneDriveResult<TokenData> {
        self.authenticate_with_cancel(CancellationToken::new()).await
    }

    /// Like [`authenticate`](Self::authenticate), abandoned when `cancel` fires.
    pub async fn authenticate_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> OneDriveResult<TokenData> {
        let result = self.flow.authenticate(cancel).await?;
        let token = result.token.ok_or_else(|| ProtocolError::InvalidResponse {
            message: "login completed without a token".to_string(),
        })?;
        self.store.replace(token.clone()).await;
        Ok(token)
    }

    /// Snapshot of the current tokens, e.g. for persisting between runs.
    pub async fn token(&self) -> Option<TokenData> {
        self.store.snapshot().await
    }

    /// Authenticated call with default options, JSON-decoded.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> OneDriveResult<T> {
        Ok(self.call_with(request, CallOptions::default()).await?.data)
    }

    /// Call with explicit options, keeping status and raw body.
    pub async fn call_with<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: CallOptions,
    ) -> OneDriveResult<ApiResponse<T>> {
        self.executor.call(request, options).await
    }

    /// Call without decoding the body.
    pub async fn call_raw(
        &self,
        request: ApiRequest,
        options: CallOptions,
    ) -> OneDriveResult<HttpResponse> {
        self.executor.call_raw(request, options).await
    }

    /// Access the users service.
    pub fn users(&self) -> UsersService<'_> {
        UsersService::new(self)
    }

    /// Profile of the signed-in user.
    pub async fn current_user(&self) -> OneDriveResult<CurrentUser> {
        self.users().me().await
    }
}

/// Create a client from configuration.
pub fn onedrive_client(config: OneDriveConfig) -> OneDriveResult<OneDriveClient> {
    OneDriveClient::new(config)
}
