//! Integration tests for the browser login

use super::*;
use integrations_onedrive::{
    ClientComponents, ErrorKind, MockTokenExchanger, OneDriveClient, OneDriveError,
    ReqwestHttpTransport, TokenError,
};
use serde_json::json;
use std::error::Error as _;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header};
use wiremock::ResponseTemplate;

fn client(
    config: OneDriveConfig,
    prompt: Arc<ChannelPrompt>,
    exchanger: Option<Arc<MockTokenExchanger>>,
) -> OneDriveClient {
    let transport = Arc::new(ReqwestHttpTransport::new(config.timeout).expect("http client"));
    let mut components = ClientComponents::new(transport).prompt(prompt);
    if let Some(exchanger) = exchanger {
        components = components.exchanger(exchanger);
    }
    OneDriveClient::with_components(config, components)
}

#[tokio::test]
async fn test_authenticate_success() {
    let server = setup_mock_server().await;
    token_endpoint()
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T",
            "refresh_token": "R",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let client = client(test_config(&server, Duration::from_millis(50)), prompt, None);

    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        let state = issued_state(&pending);
        let response = reqwest::get(redirect_url(&pending, &[("code", "abc123"), ("state", &state)]))
            .await
            .expect("callback reachable");
        (response.status(), response.text().await.unwrap_or_default())
    });

    let token = client.authenticate().await.expect("login succeeds");
    assert_eq!(token.access_token, "T");
    assert_eq!(token.refresh_token, "R");
    assert_eq!(token.expires_in, 3600);
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(client.token().await.expect("token stored").access_token, "T");

    let (status, page) = browser.await.unwrap();
    assert_eq!(status, 200);
    assert!(page.contains("Signed in"));
}

#[tokio::test]
async fn test_authorization_url_parameters() {
    let server = setup_mock_server().await;
    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let client = client(test_config(&server, Duration::from_millis(50)), prompt, None);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        trigger.cancel();
        pending
    });

    let err = client.authenticate_with_cancel(cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let pending = browser.await.unwrap();
    assert_eq!(pending.url.path(), "/authorize");
    let params: std::collections::HashMap<String, String> =
        pending.url.query_pairs().into_owned().collect();
    assert_eq!(params["client_id"], "test-client");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["response_mode"], "query");
    assert_eq!(
        params["redirect_uri"],
        format!("http://127.0.0.1:{}/authentication", pending.listening_on.port())
    );
    assert_ne!(pending.listening_on.port(), 0);
    assert_eq!(params["scope"], "profile email openid offline_access User.Read");
    assert_eq!(params["state"].len(), 43);
}

#[tokio::test]
async fn test_state_mismatch_rejects_without_exchange() {
    let server = setup_mock_server().await;
    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let exchanger = Arc::new(MockTokenExchanger::new());
    let client = client(
        test_config(&server, Duration::from_millis(50)),
        prompt,
        Some(exchanger.clone()),
    );

    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        reqwest::get(redirect_url(&pending, &[("code", "abc123"), ("state", "forged")]))
            .await
            .expect("callback reachable")
            .status()
    });

    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateMismatch);
    assert!(exchanger.get_exchange_history().is_empty());
    assert!(client.token().await.is_none());
    assert_eq!(browser.await.unwrap(), 401);
}

#[tokio::test]
async fn test_exchange_failure_wraps_remote_error() {
    let server = setup_mock_server().await;
    token_endpoint()
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS54005: code already redeemed"
        })))
        .mount(&server)
        .await;

    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let client = client(test_config(&server, Duration::from_millis(50)), prompt, None);

    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        let state = issued_state(&pending);
        reqwest::get(redirect_url(&pending, &[("code", "abc123"), ("state", &state)]))
            .await
            .expect("callback reachable")
            .status()
    });

    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TokenExchangeFailed);
    match &err {
        OneDriveError::Token(TokenError::ExchangeFailed { source }) => {
            assert_eq!(source.kind(), ErrorKind::RemoteRejected { status: 400 });
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.source().is_some());
    assert_eq!(browser.await.unwrap(), 500);
}

#[tokio::test]
async fn test_provider_error_is_access_denied() {
    let server = setup_mock_server().await;
    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let exchanger = Arc::new(MockTokenExchanger::new());
    let client = client(
        test_config(&server, Duration::from_millis(50)),
        prompt,
        Some(exchanger.clone()),
    );

    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        let state = issued_state(&pending);
        reqwest::get(redirect_url(
            &pending,
            &[
                ("error", "access_denied"),
                ("error_description", "The user declined"),
                ("state", &state),
            ],
        ))
        .await
        .expect("callback reachable")
        .status()
    });

    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert!(exchanger.get_exchange_history().is_empty());
    assert_eq!(browser.await.unwrap(), 400);
}

#[tokio::test]
async fn test_only_one_callback_is_processed() {
    let server = setup_mock_server().await;
    token_response(json!({"access_token": "T", "refresh_token": "R"}))
        .expect(1)
        .mount(&server)
        .await;

    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let client = client(test_config(&server, Duration::from_millis(500)), prompt, None);

    let browser = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        let state = issued_state(&pending);
        let http = reqwest::Client::new();

        let mut other = redirect_url(&pending, &[]);
        other.set_path("/somewhere-else");
        let not_found = http.get(other).send().await.expect("listener up").status();

        let callback = redirect_url(&pending, &[("code", "abc123"), ("state", &state)]);
        let first = http.get(callback.clone()).send().await.expect("listener up").status();
        let second = http.get(callback).send().await.expect("listener up").status();
        (not_found, first, second)
    });

    let token = client.authenticate().await.expect("login succeeds");
    assert_eq!(token.access_token, "T");

    let (not_found, first, second) = browser.await.unwrap();
    assert_eq!(not_found, 404);
    assert_eq!(first, 200);
    assert_eq!(second, 409);
}

#[tokio::test]
async fn test_cancel_closes_listener() {
    let server = setup_mock_server().await;
    let (prompt, mut pending_rx) = ChannelPrompt::new();
    let client = client(test_config(&server, Duration::from_millis(50)), prompt, None);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        let pending = pending_rx.recv().await.expect("authorization url");
        trigger.cancel();
        pending
    });

    let err = client.authenticate_with_cancel(cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let pending = watcher.await.unwrap();
    let after = reqwest::get(redirect_url(&pending, &[("code", "x"), ("state", "y")])).await;
    assert!(after.is_err(), "listener still accepting connections");
}
