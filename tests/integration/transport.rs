//! Integration tests for the authenticated transport

use super::*;
use futures::future::join_all;
use integrations_onedrive::{
    ApiRequest, CallOptions, ErrorKind, HttpMethod, HttpRequest, HttpTransport, OneDriveClient,
    ReqwestHttpTransport, TokenData,
};
use tokio_util::sync::CancellationToken;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in(server: &MockServer, access: &str, refresh: &str) -> OneDriveClient {
    OneDriveClient::new(test_config(server, Duration::from_millis(50)))
        .expect("client")
        .with_token(TokenData {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            token_type: "Bearer".to_string(),
            ..Default::default()
        })
}

async fn mount_rejection(server: &MockServer, bearer: &str) {
    Mock::given(header("authorization", bearer))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "InvalidAuthenticationToken", "message": "Access token has expired."}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let server = setup_mock_server().await;
    mount_rejection(&server, "Bearer old").await;
    Mock::given(method("POST"))
        .and(path("/v1.0/me/drive/root/children"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "item-1"})))
        .expect(1)
        .mount(&server)
        .await;
    token_endpoint()
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "refresh_token": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let request = ApiRequest::post("me/drive/root/children")
        .json(&json!({"name": "reports", "folder": {}}))
        .unwrap();
    let created: serde_json::Value = client.call(request).await.expect("retried call succeeds");
    assert_eq!(created["id"], "item-1");

    let token = client.token().await.unwrap();
    assert_eq!(token.access_token, "new");
    assert_eq!(token.refresh_token, "R2");

    let api_calls: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v1.0/me/drive/root/children")
        .collect();
    assert_eq!(api_calls.len(), 2);
    assert_eq!(api_calls[0].body, api_calls[1].body);
    assert_eq!(
        api_calls[0].headers.get("content-type"),
        api_calls[1].headers.get("content-type")
    );
}

#[tokio::test]
async fn test_second_rejection_is_returned() {
    let server = setup_mock_server().await;
    mount_rejection(&server, "Bearer old").await;
    mount_rejection(&server, "Bearer new").await;
    token_response(json!({"access_token": "new", "refresh_token": "R2"}))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let err = client
        .call::<serde_json::Value>(ApiRequest::get("me"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected { status: 401 });

    let api_calls = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v1.0/me")
        .count();
    assert_eq!(api_calls, 2);
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = setup_mock_server().await;
    Mock::given(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(100)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(4)
        .mount(&server)
        .await;
    token_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "refresh_token": "R2"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let calls = (0..4)
        .map(|_| client.call::<serde_json::Value>(ApiRequest::get("me/drive/root/children")));
    let results = join_all(calls).await;

    for result in results {
        assert_eq!(result.expect("call succeeds after shared refresh")["value"], json!([]));
    }
    assert_eq!(client.token().await.unwrap().access_token, "new");
}

#[tokio::test]
async fn test_call_without_token_sends_nothing() {
    let server = setup_mock_server().await;
    let client = OneDriveClient::new(test_config(&server, Duration::from_millis(50))).unwrap();

    let err = client
        .call::<serde_json::Value>(ApiRequest::get("me"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_requires_new_login() {
    let server = setup_mock_server().await;
    mount_rejection(&server, "Bearer old").await;
    token_endpoint()
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70008: refresh token has expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let err = client
        .call::<serde_json::Value>(ApiRequest::get("me"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RefreshFailed);
    assert!(err.needs_reauth());
}

#[tokio::test]
async fn test_anonymous_call_has_no_bearer() {
    let server = setup_mock_server().await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/me/drive/items/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = OneDriveClient::new(test_config(&server, Duration::from_millis(50))).unwrap();
    let response = client
        .call_raw(ApiRequest::delete("me/drive/items/abc"), CallOptions::anonymous())
        .await
        .expect("no content");
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());

    let sent = server.received_requests().await.unwrap();
    assert!(sent[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_cancelled_caller_does_not_cost_a_second_refresh() {
    let server = setup_mock_server().await;
    mount_rejection(&server, "Bearer old").await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "me"})))
        .expect(1)
        .mount(&server)
        .await;
    token_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "refresh_token": "R2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let (abandoned, waited) = tokio::join!(
        client.call_raw(ApiRequest::get("me"), CallOptions::default().cancel(cancel)),
        client.call_raw(ApiRequest::get("me"), CallOptions::default()),
    );
    assert_eq!(abandoned.unwrap_err().kind(), ErrorKind::Cancelled);
    assert_eq!(waited.expect("second caller reuses the refresh").status, 200);
    assert_eq!(client.token().await.unwrap().refresh_token, "R2");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "me"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let err = client
        .call_with::<serde_json::Value>(
            ApiRequest::get("me"),
            CallOptions::default().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_token_endpoint_redirect_is_not_followed() {
    let server = setup_mock_server().await;
    mount_rejection(&server, "Bearer old").await;
    token_endpoint()
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/elsewhere", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = signed_in(&server, "old", "R1");
    let err = client
        .call::<serde_json::Value>(ApiRequest::get("me"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RefreshFailed);
    assert_eq!(client.token().await.unwrap().access_token, "old");
}

#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
        .mount(&server)
        .await;

    let transport = ReqwestHttpTransport::with_options(Duration::from_secs(5), 16).unwrap();
    let url = url::Url::parse(&format!("{}/large", server.uri())).unwrap();
    let err = transport
        .send(HttpRequest::new(HttpMethod::Get, url))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}
