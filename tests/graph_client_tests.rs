//! Integration tests for Graph client retry logic
//!
//! Uses wiremock to simulate various HTTP responses and verify
//! retry behavior, rate limit handling, pagination and error propagation.

use m365ctl::error::M365Error;
use m365ctl::graph::GraphClient;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test helper to create a mock server and a client pointed at it
async fn setup() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url("abc".into(), &format!("{}/v1.0", server.uri()))
        .with_initial_backoff(Duration::ZERO);
    (server, client)
}

/// Test successful GET request (no retry needed)
#[tokio::test]
async fn test_get_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(header("authorization", "Bearer abc"))
        .and(header("accept", "application/json;odata.metadata=none"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "12345",
            "displayName": "Test User"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client.get("me").await.unwrap();
    assert_eq!(body["displayName"], "Test User");
}

/// Test 429 rate limit response with Retry-After header, then success
#[tokio::test]
async fn test_rate_limit_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/test"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "0")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client.get("test").await.unwrap();
    assert_eq!(body["ok"], true);
}

/// Test 5xx server error retried until success
#[tokio::test]
async fn test_server_error_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client.get("flaky").await.unwrap();
    assert_eq!(body["id"], "1");
}

/// Test persistent 5xx gives up after the retry budget
#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/error"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": "generalException", "message": "Something went wrong"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.get::<Value>("error").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "Something went wrong");
}

/// Test 401 is not retried and surfaces the OData message
#[tokio::test]
async fn test_unauthorized_no_retry() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": "InvalidAuthenticationToken",
                "message": "Access token has expired or is not yet valid."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get::<Value>("me").await.unwrap_err();
    match err {
        M365Error::ApiError {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(code.as_deref(), Some("InvalidAuthenticationToken"));
            assert_eq!(message, "Access token has expired or is not yet valid.");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

/// Test 404 is not retried
#[tokio::test]
async fn test_not_found_no_retry() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/teams/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not here"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get::<Value>("teams/missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP 404: Not here");
}

/// Test POST sends the JSON body
#[tokio::test]
async fn test_post_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1.0/chats/19:abc@thread.v2/messages"))
        .and(body_json(json!({"body": {"content": "Hello"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1616"})))
        .expect(1)
        .mount(&server)
        .await;

    let created: Value = client
        .post(
            "chats/19:abc@thread.v2/messages",
            &json!({"body": {"content": "Hello"}}),
        )
        .await
        .unwrap();
    assert_eq!(created["id"], "1616");
}

/// Test PATCH answered with 204 No Content
#[tokio::test]
async fn test_patch_no_content() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/v1.0/users/steve@contoso.com"))
        .and(body_json(json!({"accountEnabled": true})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .patch_no_content("users/steve@contoso.com", &json!({"accountEnabled": true}))
        .await
        .unwrap();
}

/// Test pagination follows @odata.nextLink across pages
#[tokio::test]
async fn test_get_all_pages_follows_next_link() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "3"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1"}, {"id": "2"}],
            "@odata.nextLink": format!("{}/v1.0/groups?$skiptoken=page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items: Vec<Value> = client.get_all_pages("groups").await.unwrap();
    let ids: Vec<&str> = items.iter().filter_map(|i| i["id"].as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

/// Test raw text bodies (CSV reports)
#[tokio::test]
async fn test_get_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/reports/getTeamsDeviceUsageUserCounts(period='D7')"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Report Refresh Date,Web\n2019-08-28,0\n"))
        .expect(1)
        .mount(&server)
        .await;

    let report = client
        .get_text("reports/getTeamsDeviceUsageUserCounts(period='D7')")
        .await
        .unwrap();
    assert!(report.starts_with("Report Refresh Date"));
}

/// Test an explicit accept header replaces the default one
#[tokio::test]
async fn test_custom_accept_header() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/planner/tasks/1/details"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"@odata.etag": "W/\"1\""})))
        .expect(1)
        .mount(&server)
        .await;

    let details: Value = client
        .get_with_headers("planner/tasks/1/details", &[("accept", "application/json")])
        .await
        .unwrap();
    assert_eq!(details["@odata.etag"], "W/\"1\"");
}
