//! Integration tests using WireMock
//!
//! The token endpoint and the Graph API are served by a mock HTTP server; a
//! reqwest client plays the browser that follows the authorization redirect.

mod authenticate;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use integrations_onedrive::{
    onedrive_config, AuthorizationPrompt, OneDriveConfig, OneDriveResult, PendingAuthorization,
};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const CALLBACK_PATH: &str = "/authentication";

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// A local port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free local port")
        .port()
}

/// Configuration pointing every endpoint at `server`, with a callback on a
/// free local port.
pub fn test_config(server: &MockServer, grace: Duration) -> OneDriveConfig {
    onedrive_config()
        .client_id("test-client")
        .client_secret("test-secret")
        .redirect_uri(format!("http://127.0.0.1:{}{CALLBACK_PATH}", free_port()))
        .authorization_endpoint(format!("{}/authorize", server.uri()))
        .token_endpoint(format!("{}/token", server.uri()))
        .api_base_url(format!("{}/v1.0/", server.uri()))
        .shutdown_grace(grace)
        .callback_timeout(Some(Duration::from_secs(10)))
        .build()
        .expect("valid test config")
}

/// Matcher for requests to the token endpoint
pub fn token_endpoint() -> MockBuilder {
    Mock::given(method("POST")).and(path("/token"))
}

/// Helper to create a successful token response
pub fn token_response(body: serde_json::Value) -> Mock {
    token_endpoint().respond_with(ResponseTemplate::new(200).set_body_json(body))
}

/// Hands the authorization URL to the test instead of printing it.
pub struct ChannelPrompt {
    tx: mpsc::UnboundedSender<PendingAuthorization>,
}

impl ChannelPrompt {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingAuthorization>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl AuthorizationPrompt for ChannelPrompt {
    async fn present(&self, pending: &PendingAuthorization) -> OneDriveResult<()> {
        let _ = self.tx.send(pending.clone());
        Ok(())
    }
}

/// The `state` the flow put into the authorization URL.
pub fn issued_state(pending: &PendingAuthorization) -> String {
    pending
        .url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("authorization URL carries state")
}

/// URL the authorization server would redirect the browser to.
pub fn redirect_url(pending: &PendingAuthorization, params: &[(&str, &str)]) -> url::Url {
    let mut url = url::Url::parse(&format!("http://{}{CALLBACK_PATH}", pending.listening_on))
        .expect("valid callback url");
    url.query_pairs_mut().extend_pairs(params);
    url
}
