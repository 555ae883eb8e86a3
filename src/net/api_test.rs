use super::*;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpAlertApi {
    HttpAlertApi::new(&SyncConfig::default().with_base_url(&server.uri())).unwrap()
}

// =============================================================
// endpoints
// =============================================================

#[test]
fn alert_endpoint_formats_expected_path() {
    assert_eq!(alert_endpoint(12), "/api/alerts/12");
}

#[test]
fn chat_endpoint_formats_expected_path() {
    assert_eq!(chat_endpoint(12), "/api/alerts/12/chat");
}

#[test]
fn parse_body_reports_decode_errors() {
    let err = parse_body::<Vec<AlertSummary>>("{\"not\":\"a list\"}").unwrap_err();
    assert!(matches!(err, SyncError::Decode(_)));
}

// =============================================================
// HttpAlertApi
// =============================================================

#[tokio::test]
async fn list_alerts_decodes_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": 1, "created_at": "t1", "details_kind": "hijack", "prefix": "192.0.2.0/24" },
            { "id": 2, "created_at": "t2" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let alerts = api_for(&server).list_alerts().await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].details_kind.as_deref(), Some("hijack"));
    assert_eq!(alerts[1].id, 2);
}

#[tokio::test]
async fn get_alert_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_for(&server).get_alert(9).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn get_alert_keeps_status_and_body_of_other_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .mount(&server)
        .await;

    match api_for(&server).get_alert(9).await.unwrap_err() {
        SyncError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database locked");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn get_alert_reports_malformed_body_as_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).get_alert(9).await.unwrap_err();
    assert!(matches!(err, SyncError::Decode(_)));
}

#[tokio::test]
async fn delete_alert_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/alerts/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).delete_alert(4).await.unwrap();
}

#[tokio::test]
async fn send_chat_posts_message_and_decodes_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/alerts/2/chat"))
        .and(body_json(serde_json::json!({ "message": "ping" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message_id": 31, "response": "pong" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reply = api_for(&server).send_chat(2, "ping").await.unwrap();
    assert_eq!(reply, ChatReply { message_id: 31, response: "pong".into() });
}

#[tokio::test]
async fn health_returns_raw_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "database": "ok" })))
        .mount(&server)
        .await;

    let status = api_for(&server).health().await.unwrap();
    assert_eq!(status["database"], "ok");
}

#[tokio::test]
async fn submit_alert_posts_raw_payload() {
    let server = MockServer::start().await;
    let alert = serde_json::json!({ "message": "possible hijack", "details": { "prefix": "192.0.2.0/24" } });
    Mock::given(method("POST"))
        .and(path("/api/alerts"))
        .and(body_json(alert.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "alert_id": 5, "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let body = api_for(&server).submit_alert(&alert).await.unwrap();
    assert_eq!(body["alert_id"], 5);
}
