//! End-to-end conference flows driven through the command queue.
//!
//! Covers:
//! - join, remote publish/unpublish and leave on shutdown
//! - publishes still queued when the user leaves
//! - screen share suppressing remote video containers
//! - screen share token refusal keeping the main call alive
//! - chat send and inbound delivery

use std::sync::Arc;
use std::time::Duration;

use huddle_client::chat::mock::MockChatConnector;
use huddle_client::display::mock::RecordingDisplay;
use huddle_client::gateway::mock::StaticTokens;
use huddle_client::sdk::mock::MockRtcEngine;
use huddle_client::{
    run_conference, ClientConfig, Conference, ConferenceHandle, ContainerKey, MediaKind,
    RemoteParticipant, SessionEvent, Uid,
};
use huddle_common::{ChatMessage, Error};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    handle: ConferenceHandle,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<huddle_common::Result<Conference<RecordingDisplay>>>,
    engine: Arc<MockRtcEngine>,
    chat: Arc<MockChatConnector>,
    tokens: Arc<StaticTokens>,
    display: RecordingDisplay,
}

fn start(slot_capacity: usize) -> Running {
    let config = ClientConfig {
        app_id: "app".into(),
        slot_capacity,
        ..ClientConfig::default()
    };
    let engine = MockRtcEngine::new();
    let chat = MockChatConnector::new();
    let tokens = Arc::new(StaticTokens::new());
    let display = RecordingDisplay::new();

    let (conference, events) = Conference::new(
        config,
        engine.clone(),
        chat.clone(),
        tokens.clone(),
        display.clone(),
    )
    .unwrap();
    let (handle, commands) = ConferenceHandle::channel();
    let (shutdown, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_conference(conference, commands, events, shutdown_rx));

    Running {
        handle,
        shutdown,
        task,
        engine,
        chat,
        tokens,
        display,
    }
}

impl Running {
    fn emit(&self, event: SessionEvent) {
        assert!(self.engine.client(0).unwrap().emit(event));
    }

    async fn stop(self) -> Conference<RecordingDisplay> {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap()
    }
}

fn announced(uid: u32) -> RemoteParticipant {
    let mut participant = RemoteParticipant::new(uid);
    participant.has_audio = true;
    participant.has_video = true;
    participant
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_remote_participant_lifecycle_and_shutdown() {
    let running = start(4);
    let uid = running.handle.join().await.unwrap();
    assert!(matches!(
        running.handle.join().await,
        Err(Error::InvalidState(_))
    ));

    let key = ContainerKey::remote(&Uid::Number(42));
    running.emit(SessionEvent::Published {
        participant: announced(42),
        kind: MediaKind::Audio,
    });
    running.emit(SessionEvent::Published {
        participant: announced(42),
        kind: MediaKind::Video,
    });
    let display = running.display.clone();
    eventually(|| display.is_live(&key)).await;
    assert_eq!(
        running.engine.client(0).unwrap().subscriptions(),
        vec![
            (Uid::Number(42), MediaKind::Audio),
            (Uid::Number(42), MediaKind::Video)
        ]
    );

    running.emit(SessionEvent::Unpublished {
        participant: announced(42),
        kind: MediaKind::Video,
    });
    eventually(|| !display.is_live(&key)).await;

    assert!(running.handle.toggle_mute().await.unwrap());
    assert!(running.handle.toggle_camera().await.unwrap());

    let engine = running.engine.clone();
    let conference = running.stop().await;
    assert!(!conference.session().is_joined());
    assert_eq!(conference.reconciler().container_count(), 0);
    assert_eq!(engine.client(0).unwrap().leave_calls(), 1);
    assert_eq!(
        engine.client(0).unwrap().joined_uid(),
        None,
        "client {uid} should have left"
    );
}

#[tokio::test]
async fn test_publish_queued_behind_leave_leaves_no_container() {
    let running = start(4);
    running.handle.join().await.unwrap();

    running.emit(SessionEvent::Published {
        participant: announced(42),
        kind: MediaKind::Video,
    });
    running.handle.leave().await.unwrap();

    // Let the loop drain the event queue after the leave.
    assert!(running.handle.messages().await.unwrap().is_empty());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let display = running.display.clone();
    let conference = running.stop().await;
    assert!(!conference.session().is_joined());
    assert_eq!(conference.reconciler().container_count(), 0);
    assert!(display.live().is_empty());
}

#[tokio::test]
async fn test_screen_share_hides_new_remote_video() {
    let running = start(2);
    running.handle.join().await.unwrap();
    assert!(running.handle.toggle_screen_share().await.unwrap());
    assert!(running.display.is_live(&ContainerKey::screen_share()));

    running.emit(SessionEvent::Published {
        participant: announced(7),
        kind: MediaKind::Video,
    });
    let client = running.engine.client(0).unwrap();
    eventually(|| client.subscriptions().len() == 1).await;
    assert!(!running.display.is_live(&ContainerKey::remote(&Uid::Number(7))));

    assert!(!running.handle.toggle_screen_share().await.unwrap());
    assert!(!running.display.is_live(&ContainerKey::screen_share()));
    assert_eq!(running.engine.client(1).unwrap().leave_calls(), 1);

    running.stop().await;
}

#[tokio::test]
async fn test_screen_share_token_refusal_keeps_call() {
    let running = start(2);
    let uid = running.handle.join().await.unwrap();
    running.tokens.refuse(uid.screen_share().to_string());

    let err = running.handle.toggle_screen_share().await.unwrap_err();
    assert!(err.is_gateway());
    assert_eq!(running.engine.client_count(), 1);

    // The main call still answers.
    assert!(running.handle.toggle_mute().await.unwrap());

    let conference = running.stop().await;
    assert!(!conference.session().is_screen_sharing());
}

#[tokio::test]
async fn test_join_token_refusal_is_reported() {
    let running = start(2);
    running.tokens.refuse_all(true);
    assert!(running.handle.join().await.unwrap_err().is_gateway());

    let conference = running.stop().await;
    assert!(!conference.session().is_joined());
}

#[tokio::test]
async fn test_chat_round_trip_through_loop() {
    let running = start(2);
    assert!(matches!(
        running.handle.send_message("too early").await,
        Err(Error::NotInitialized)
    ));

    running.handle.login_chat("ana").await.unwrap();
    running.handle.send_message("hello").await.unwrap();
    running.handle.send_message("  ").await.unwrap();

    let connection = running.chat.connection(0).unwrap();
    assert_eq!(connection.user(), "ana");
    assert_eq!(connection.sent().len(), 1);

    assert!(connection.deliver("bob", r#"{"user":"bob","text":"hi ana"}"#));
    assert!(connection.deliver("bob", "not a chat line"));

    let mut history = Vec::new();
    for _ in 0..200 {
        history = running.handle.messages().await.unwrap();
        if history.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        history.last(),
        Some(&ChatMessage {
            user: "bob".into(),
            text: "hi ana".into()
        })
    );
    assert_eq!(history[1].user, "ana");

    let chat = running.chat.clone();
    running.stop().await;
    assert!(chat.connection(0).unwrap().is_closed());
}

#[tokio::test]
async fn test_handle_fails_after_loop_stops() {
    let running = start(1);
    let handle = running.handle.clone();
    running.stop().await;

    assert!(matches!(handle.toggle_mute().await, Err(Error::Internal(_))));
}
