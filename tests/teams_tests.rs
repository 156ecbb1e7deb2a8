//! Integration tests for the Teams commands against a mocked Graph API

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use m365ctl::cmd::teams::{ChatMessageSendArgs, TeamGetArgs, send_message, get_team};
use m365ctl::error::M365Error;
use m365ctl::graph::GraphClient;
use m365ctl::graph::teams::TeamsClient;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_ID: &str = "19:2da4c29f6d7041eca70b638b43d45437@thread.v2";

fn user_token() -> String {
    let claims = json!({"upn": "Admin@Contoso.com", "scp": "Chat.ReadWrite"});
    format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

async fn setup() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url(user_token(), &format!("{}/v1.0", server.uri()))
        .with_initial_backoff(Duration::ZERO);
    (server, client)
}

fn member(email: &str) -> Value {
    json!({"email": email, "displayName": email})
}

#[tokio::test]
async fn test_team_get_by_name_ignores_groups_without_team() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param("$filter", "displayName eq 'Finance Team'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "00000000-0000-0000-0000-000000000001", "resourceProvisioningOptions": []},
                {"id": "00000000-0000-0000-0000-000000000002", "resourceProvisioningOptions": ["Team"]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/teams/00000000-0000-0000-0000-000000000002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "00000000-0000-0000-0000-000000000002",
            "displayName": "Finance Team",
            "isArchived": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let args = TeamGetArgs {
        id: None,
        name: Some("Finance Team".into()),
    };
    let team = get_team(&args, &client).await.unwrap();
    assert_eq!(team["displayName"], "Finance Team");
}

#[tokio::test]
async fn test_team_get_by_name_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "resourceProvisioningOptions": []}]
        })))
        .mount(&server)
        .await;

    let args = TeamGetArgs {
        id: None,
        name: Some("Finance".into()),
    };
    let err = get_team(&args, &client).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "The specified team does not exist in the Microsoft Teams"
    );
}

#[tokio::test]
async fn test_team_get_by_name_ambiguous() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "a", "resourceProvisioningOptions": ["Team"]},
                {"id": "b", "resourceProvisioningOptions": ["Team"]}
            ]
        })))
        .mount(&server)
        .await;

    let args = TeamGetArgs {
        id: None,
        name: Some("Finance".into()),
    };
    let err = get_team(&args, &client).await.unwrap_err();
    assert!(matches!(err, M365Error::Ambiguous(_)));
    assert_eq!(
        err.to_string(),
        "Multiple Microsoft Teams teams with name Finance found: a,b"
    );
}

#[tokio::test]
async fn test_chat_messages_are_flattened_across_pages() {
    let (server, client) = setup().await;
    let long = "x".repeat(60);

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/chats/{}/messages", CHAT_ID)))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "2", "body": {"contentType": "text", "content": long}}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/chats/{}/messages", CHAT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "body": {"contentType": "text", "content": "Hello"}}],
            "@odata.nextLink": format!("{}/v1.0/chats/{}/messages?$skiptoken=2", server.uri(), CHAT_ID)
        })))
        .mount(&server)
        .await;

    let messages = TeamsClient::new(&client)
        .list_chat_messages(CHAT_ID)
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["body"], "Hello");
    assert_eq!(messages[0]["shortBody"], "Hello");
    assert_eq!(messages[1]["shortBody"], format!("{}...", "x".repeat(50)));
}

#[tokio::test]
async fn test_send_message_to_existing_chat_by_members() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/chats"))
        .and(query_param("$filter", "chatType eq 'oneOnOne'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "19:other@unq.gbl.spaces", "members": [member("admin@contoso.com"), member("someone@contoso.com")]},
                {"id": CHAT_ID, "members": [member("Admin@Contoso.com"), member("Alex@Contoso.com")]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1.0/chats/{}/messages", CHAT_ID)))
        .and(body_partial_json(json!({"body": {"content": "Hello"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1616"})))
        .expect(1)
        .mount(&server)
        .await;

    let args = ChatMessageSendArgs {
        chat_id: None,
        user_emails: Some("alex@contoso.com".into()),
        chat_name: None,
        message: "Hello".into(),
    };
    let sent = send_message(&args, &client).await.unwrap();
    assert_eq!(sent["id"], "1616");
}

#[tokio::test]
async fn test_send_message_creates_chat_retrying_404() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/chats"))
        .and(query_param("$filter", "chatType eq 'group'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/chats"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NotFound", "message": "User not found"}
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/chats"))
        .and(body_partial_json(json!({"chatType": "group"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": CHAT_ID})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1.0/chats/{}/messages", CHAT_ID)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let args = ChatMessageSendArgs {
        chat_id: None,
        user_emails: Some("alex@contoso.com,admin@contoso.com, megan@contoso.com".into()),
        chat_name: None,
        message: "Hello".into(),
    };
    send_message(&args, &client).await.unwrap();
}

#[tokio::test]
async fn test_create_chat_gives_up_after_retry_budget() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1.0/chats"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NotFound", "message": "User not found"}
        })))
        .expect(5)
        .mount(&server)
        .await;

    let err = TeamsClient::new(&client)
        .create_chat(&["admin@contoso.com".into(), "alex@contoso.com".into()])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "User not found");
}

#[tokio::test]
async fn test_create_chat_does_not_retry_other_errors() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1.0/chats"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "Forbidden", "message": "Missing scope"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = TeamsClient::new(&client)
        .create_chat(&["admin@contoso.com".into(), "alex@contoso.com".into()])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_send_message_by_chat_name_ambiguous() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/chats"))
        .and(query_param("$filter", "topic eq 'Project Rollout'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "19:a@thread.v2", "topic": "Project Rollout", "createdDateTime": "2021-01-01T00:00:00Z", "members": [member("admin@contoso.com")]},
                {"id": "19:b@thread.v2", "topic": "Project Rollout", "createdDateTime": "2021-02-01T00:00:00Z", "members": [member("alex@contoso.com")]}
            ]
        })))
        .mount(&server)
        .await;

    let args = ChatMessageSendArgs {
        chat_id: None,
        user_emails: None,
        chat_name: Some("Project Rollout".into()),
        message: "Hello".into(),
    };
    let err = send_message(&args, &client).await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Multiple chat conversations with this name found."));
    assert!(message.contains("- 19:a@thread.v2 - 2021-01-01T00:00:00Z - admin@contoso.com"));
    assert!(message.contains("- 19:b@thread.v2 - 2021-02-01T00:00:00Z - alex@contoso.com"));
}

#[tokio::test]
async fn test_send_message_by_chat_name_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let args = ChatMessageSendArgs {
        chat_id: None,
        user_emails: None,
        chat_name: Some("Nothing".into()),
        message: "Hello".into(),
    };
    let err = send_message(&args, &client).await.unwrap_err();
    assert_eq!(err.to_string(), "No chat conversation was found with this name.");
}

#[tokio::test]
async fn test_device_usage_report() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/reports/getTeamsDeviceUsageUserCounts(period='D30')"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "\u{feff}Report Refresh Date,Web,Windows Phone,Android Phone,iOS,Mac,Windows,Report Date,Report Period\n2019-08-28,0,0,0,0,0,0,2019-08-28,7\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let report = TeamsClient::new(&client)
        .device_usage_user_counts("D30")
        .await
        .unwrap();
    assert!(report.contains("Report Refresh Date"));
}
