//! Conference wired to a real `TokenGateway` against a mock HTTP backend.

use std::sync::Arc;

use huddle_client::chat::mock::MockChatConnector;
use huddle_client::sdk::mock::MockRtcEngine;
use huddle_client::{ClientConfig, Conference, TokenGateway, TracingDisplay};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope(token: &str) -> serde_json::Value {
    serde_json::json!({ "success": "true", "data": token, "error": "" })
}

async fn conference(
    server: &MockServer,
) -> (Conference<TracingDisplay>, Arc<MockRtcEngine>, Arc<MockChatConnector>) {
    let config = ClientConfig {
        app_id: "app".into(),
        channel: "standup".into(),
        gateway_url: server.uri(),
        ..ClientConfig::default()
    };
    let gateway = TokenGateway::from_config(&config).unwrap();
    let engine = MockRtcEngine::new();
    let chat = MockChatConnector::new();
    let display = TracingDisplay::from_config(&config);
    let (conference, _events) = Conference::new(
        config,
        engine.clone(),
        chat.clone(),
        Arc::new(gateway),
        display,
    )
    .unwrap();
    (conference, engine, chat)
}

#[tokio::test]
async fn test_join_and_screen_share_fetch_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/agora/chat/user/channel"))
        .and(query_param("channel", "standup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("rtc-token")))
        .expect(2)
        .mount(&server)
        .await;

    let (mut conference, engine, _chat) = conference(&server).await;
    conference.join().await.unwrap();
    assert_eq!(
        engine.client(0).unwrap().joined_token().as_deref(),
        Some("rtc-token")
    );

    assert!(conference.toggle_screen_share().await.unwrap());
    assert_eq!(
        engine.client(1).unwrap().joined_token().as_deref(),
        Some("rtc-token")
    );
    assert_eq!(conference.reconciler().display().len(), 1);
}

#[tokio::test]
async fn test_gateway_outage_aborts_join() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (mut conference, engine, _chat) = conference(&server).await;
    assert!(conference.join().await.unwrap_err().is_gateway());
    assert!(engine.client(0).unwrap().joined_uid().is_none());
    assert!(engine.local_tracks().is_empty());
}

#[tokio::test]
async fn test_chat_login_uses_user_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/agora/chat/user/ana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("chat-token")))
        .expect(1)
        .mount(&server)
        .await;

    let (mut conference, _engine, chat) = conference(&server).await;
    conference.login_chat("ana").await.unwrap();

    assert!(conference.is_chat_ready());
    assert_eq!(
        chat.logins(),
        vec![(
            "app".to_string(),
            "ana".to_string(),
            "chat-token".to_string()
        )]
    );
}

#[tokio::test]
async fn test_refused_chat_token_leaves_chat_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/agora/chat/user/ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "data": null,
            "error": "unknown user"
        })))
        .mount(&server)
        .await;

    let (mut conference, _engine, chat) = conference(&server).await;
    let err = conference.login_chat("ghost").await.unwrap_err();
    assert!(err.to_string().contains("unknown user"));
    assert!(!conference.is_chat_ready());
    assert!(chat.logins().is_empty());
}
