//! Authorization Code Flow
//!
//! RFC 6749 Section 4.1 - Authorization Code Grant with a local redirect
//! listener.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use crate::core::{FlowState, StateGenerator};
use crate::error::OneDriveResult;
use crate::flows::callback::CallbackListener;
use crate::render::PageRenderer;
use crate::token::TokenExchanger;
use crate::types::{AuthResult, Credentials, OneDriveConfig};

/// Build the URL the operator opens in a browser.
///
/// Parameters are emitted in a fixed order, so the result only depends on
/// the inputs.
pub fn build_authorization_url(endpoint: &Url, credentials: &Credentials, state: &FlowState) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("client_secret", credentials.expose_secret())
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", credentials.redirect_uri.as_str())
        .append_pair("response_mode", "query")
        .append_pair("scope", &credentials.scope_string())
        .append_pair("state", state.as_str());
    url
}

/// A login waiting for the operator.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// URL to open in the browser.
    pub url: Url,
    /// Address the callback listener is bound to.
    pub listening_on: SocketAddr,
}

/// Shows the authorization URL to the operator.
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    async fn present(&self, pending: &PendingAuthorization) -> OneDriveResult<()>;
}

/// Prints the URL on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

#[async_trait]
impl AuthorizationPrompt for ConsolePrompt {
    async fn present(&self, pending: &PendingAuthorization) -> OneDriveResult<()> {
        println!("Please, authenticate here: {}", pending.url);
        Ok(())
    }
}

/// One browser login: state, URL, listener, exchange.
pub struct AuthorizationCodeFlow {
    config: OneDriveConfig,
    exchanger: Arc<dyn TokenExchanger>,
    state_generator: Arc<dyn StateGenerator>,
    renderer: Arc<dyn PageRenderer>,
    prompt: Arc<dyn AuthorizationPrompt>,
}

impl AuthorizationCodeFlow {
    pub fn new(
        config: OneDriveConfig,
        exchanger: Arc<dyn TokenExchanger>,
        state_generator: Arc<dyn StateGenerator>,
        renderer: Arc<dyn PageRenderer>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        Self {
            config,
            exchanger,
            state_generator,
            renderer,
            prompt,
        }
    }

    /// Run the login and return what the callback produced.
    ///
    /// Blocks until the callback listener has closed. On success the result
    /// carries the token set; the caller decides where to store it.
    #[instrument(skip_all, fields(client_id = %self.config.credentials.client_id))]
    pub async fn authenticate(&self, cancel: CancellationToken) -> OneDriveResult<AuthResult> {
        let credentials = &self.config.credentials;
        let state = self.state_generator.generate()?;
        let url = build_authorization_url(&self.config.provider.authorization_endpoint, credentials, &state);

        let listener = CallbackListener::new(
            credentials.callback_bind_addr()?,
            credentials.callback_path(),
        )
        .grace(self.config.shutdown_grace)
        .bind(state, self.exchanger.clone(), self.renderer.clone())
        .await?;

        let pending = PendingAuthorization {
            url,
            listening_on: listener.local_addr(),
        };
        if let Err(e) = self.prompt.present(&pending).await {
            listener.close().await;
            return Err(e);
        }

        let result = listener.wait(cancel, self.config.callback_timeout).await?;
        info!("Authentication completed");
        Ok(result)
    }
}
