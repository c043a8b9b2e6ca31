//! Seams to the vendor RTC SDK.
//!
//! The SDK owns media transport, codecs and rendering. This crate only drives
//! it through these traits; a platform binding implements them and the
//! [`mock`] module provides doubles for tests.

use async_trait::async_trait;
use huddle_common::Result;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::types::{ContainerKey, MediaKind, RemoteParticipant, Uid};

/// Notifications emitted by an RTC client, delivered in emission order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Published {
        participant: RemoteParticipant,
        kind: MediaKind,
    },
    Unpublished {
        participant: RemoteParticipant,
        kind: MediaKind,
    },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Rtc,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Vp8,
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub mode: ClientMode,
    pub codec: VideoCodec,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            mode: ClientMode::Rtc,
            codec: VideoCodec::Vp8,
        }
    }
}

/// A track received from a remote participant.
pub trait RemoteTrack: Send + Sync + fmt::Debug {
    fn kind(&self) -> MediaKind;

    /// Starts playback. Video plays into `target`; audio ignores it.
    fn play(&self, target: Option<&ContainerKey>);

    fn stop(&self);

    fn is_playing(&self) -> bool;
}

/// A track captured locally (microphone, camera or screen).
pub trait LocalTrack: Send + Sync + fmt::Debug {
    fn kind(&self) -> MediaKind;

    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn play(&self, target: &ContainerKey);

    /// Releases the capture device. The track cannot be used afterwards.
    fn close(&self);
}

pub type LocalTrackHandle = Arc<dyn LocalTrack>;

#[async_trait]
pub trait RtcClient: Send + Sync {
    /// Joins `channel`, returning the uid the SDK settled on.
    async fn join(
        &self,
        app_id: &str,
        channel: &str,
        token: Option<&str>,
        uid: &Uid,
    ) -> Result<Uid>;

    async fn publish(&self, tracks: &[LocalTrackHandle]) -> Result<()>;

    /// Completes the subscribe handshake and returns the participant with the
    /// track handle for `kind` filled in.
    async fn subscribe(
        &self,
        participant: &RemoteParticipant,
        kind: MediaKind,
    ) -> Result<RemoteParticipant>;

    async fn leave(&self) -> Result<()>;
}

#[async_trait]
pub trait RtcEngine: Send + Sync {
    /// Creates a client. Clients created without an event sender never report
    /// remote activity.
    fn create_client(
        &self,
        options: ClientOptions,
        events: Option<EventSender>,
    ) -> Result<Arc<dyn RtcClient>>;

    async fn create_microphone_track(&self) -> Result<LocalTrackHandle>;

    async fn create_camera_track(&self) -> Result<LocalTrackHandle>;

    async fn create_screen_track(&self, encoder_profile: &str) -> Result<LocalTrackHandle>;
}

/// Mock RTC SDK for unit and integration testing.
pub mod mock {
    use super::*;
    use crate::helpers::lock;
    use huddle_common::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Remote track recording play/stop calls.
    #[derive(Debug)]
    pub struct MockRemoteTrack {
        kind: MediaKind,
        playing: AtomicBool,
        play_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        target: Mutex<Option<ContainerKey>>,
    }

    impl MockRemoteTrack {
        pub fn new(kind: MediaKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                playing: AtomicBool::new(false),
                play_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                target: Mutex::new(None),
            })
        }

        pub fn audio() -> Arc<Self> {
            Self::new(MediaKind::Audio)
        }

        pub fn video() -> Arc<Self> {
            Self::new(MediaKind::Video)
        }

        pub fn play_calls(&self) -> usize {
            self.play_calls.load(Ordering::SeqCst)
        }

        pub fn stop_calls(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }

        pub fn target(&self) -> Option<ContainerKey> {
            lock(&self.target).clone()
        }
    }

    impl RemoteTrack for MockRemoteTrack {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        fn play(&self, target: Option<&ContainerKey>) {
            self.play_calls.fetch_add(1, Ordering::SeqCst);
            self.playing.store(true, Ordering::SeqCst);
            *lock(&self.target) = target.cloned();
        }

        fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.playing.store(false, Ordering::SeqCst);
        }

        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }
    }

    /// Local track recording enablement, playback target and close.
    #[derive(Debug)]
    pub struct MockLocalTrack {
        kind: MediaKind,
        enabled: AtomicBool,
        closed: AtomicBool,
        played_into: Mutex<Option<ContainerKey>>,
    }

    impl MockLocalTrack {
        pub fn new(kind: MediaKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                enabled: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                played_into: Mutex::new(None),
            })
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        pub fn played_into(&self) -> Option<ContainerKey> {
            lock(&self.played_into).clone()
        }
    }

    impl LocalTrack for MockLocalTrack {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        fn play(&self, target: &ContainerKey) {
            *lock(&self.played_into) = Some(target.clone());
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Mock RTC client. Records joins, publishes and leaves, and lets tests
    /// emit remote events through the sender it was created with.
    pub struct MockRtcClient {
        options: ClientOptions,
        events: Option<EventSender>,
        joined: Mutex<Option<(String, String, Option<String>, Uid)>>,
        published: Mutex<Vec<LocalTrackHandle>>,
        subscriptions: Mutex<Vec<(Uid, MediaKind)>>,
        leave_calls: AtomicUsize,
        fail_join: AtomicBool,
        fail_subscribe: AtomicBool,
        fail_leave: AtomicBool,
    }

    impl MockRtcClient {
        fn new(options: ClientOptions, events: Option<EventSender>) -> Self {
            Self {
                options,
                events,
                joined: Mutex::new(None),
                published: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
                leave_calls: AtomicUsize::new(0),
                fail_join: AtomicBool::new(false),
                fail_subscribe: AtomicBool::new(false),
                fail_leave: AtomicBool::new(false),
            }
        }

        pub fn options(&self) -> ClientOptions {
            self.options
        }

        /// Pushes an event as the SDK would. Returns false if the client has
        /// no event sender or the receiver is gone.
        pub fn emit(&self, event: SessionEvent) -> bool {
            match &self.events {
                Some(tx) => tx.send(event).is_ok(),
                None => false,
            }
        }

        pub fn joined_uid(&self) -> Option<Uid> {
            lock(&self.joined).as_ref().map(|(_, _, _, uid)| uid.clone())
        }

        pub fn joined_token(&self) -> Option<String> {
            lock(&self.joined).as_ref().and_then(|(_, _, t, _)| t.clone())
        }

        pub fn joined_channel(&self) -> Option<String> {
            lock(&self.joined).as_ref().map(|(_, c, _, _)| c.clone())
        }

        pub fn published_kinds(&self) -> Vec<MediaKind> {
            lock(&self.published).iter().map(|t| t.kind()).collect()
        }

        pub fn subscriptions(&self) -> Vec<(Uid, MediaKind)> {
            lock(&self.subscriptions).clone()
        }

        pub fn leave_calls(&self) -> usize {
            self.leave_calls.load(Ordering::SeqCst)
        }

        pub fn fail_join(&self, fail: bool) {
            self.fail_join.store(fail, Ordering::SeqCst);
        }

        pub fn fail_subscribe(&self, fail: bool) {
            self.fail_subscribe.store(fail, Ordering::SeqCst);
        }

        pub fn fail_leave(&self, fail: bool) {
            self.fail_leave.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RtcClient for MockRtcClient {
        async fn join(
            &self,
            app_id: &str,
            channel: &str,
            token: Option<&str>,
            uid: &Uid,
        ) -> Result<Uid> {
            if self.fail_join.load(Ordering::SeqCst) {
                return Err(Error::sdk("mock join rejected"));
            }
            *lock(&self.joined) = Some((
                app_id.to_string(),
                channel.to_string(),
                token.map(str::to_string),
                uid.clone(),
            ));
            Ok(uid.clone())
        }

        async fn publish(&self, tracks: &[LocalTrackHandle]) -> Result<()> {
            if lock(&self.joined).is_none() {
                return Err(Error::sdk("publish before join"));
            }
            lock(&self.published).extend(tracks.iter().cloned());
            Ok(())
        }

        async fn subscribe(
            &self,
            participant: &RemoteParticipant,
            kind: MediaKind,
        ) -> Result<RemoteParticipant> {
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(Error::sdk("mock subscribe rejected"));
            }
            lock(&self.subscriptions).push((participant.uid.clone(), kind));
            let mut subscribed = participant.clone();
            match kind {
                MediaKind::Audio if subscribed.audio_track.is_none() => {
                    subscribed.audio_track = Some(MockRemoteTrack::audio());
                }
                MediaKind::Video if subscribed.video_track.is_none() => {
                    subscribed.video_track = Some(MockRemoteTrack::video());
                }
                _ => {}
            }
            Ok(subscribed)
        }

        async fn leave(&self) -> Result<()> {
            self.leave_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_leave.load(Ordering::SeqCst) {
                return Err(Error::sdk("mock leave rejected"));
            }
            lock(&self.joined).take();
            lock(&self.published).clear();
            Ok(())
        }
    }

    /// Mock RTC engine. Keeps every client and track it creates so tests can
    /// inspect them.
    #[derive(Default)]
    pub struct MockRtcEngine {
        clients: Mutex<Vec<Arc<MockRtcClient>>>,
        local_tracks: Mutex<Vec<Arc<MockLocalTrack>>>,
        screen_profiles: Mutex<Vec<String>>,
        fail_camera: AtomicBool,
        fail_screen: AtomicBool,
        fail_second_client_join: AtomicBool,
    }

    impl MockRtcEngine {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn client(&self, index: usize) -> Option<Arc<MockRtcClient>> {
            lock(&self.clients).get(index).cloned()
        }

        pub fn client_count(&self) -> usize {
            lock(&self.clients).len()
        }

        pub fn local_tracks(&self) -> Vec<Arc<MockLocalTrack>> {
            lock(&self.local_tracks).clone()
        }

        pub fn screen_profiles(&self) -> Vec<String> {
            lock(&self.screen_profiles).clone()
        }

        pub fn fail_camera(&self, fail: bool) {
            self.fail_camera.store(fail, Ordering::SeqCst);
        }

        pub fn fail_screen(&self, fail: bool) {
            self.fail_screen.store(fail, Ordering::SeqCst);
        }

        /// Makes every client created after the first reject `join`.
        pub fn fail_second_client_join(&self, fail: bool) {
            self.fail_second_client_join.store(fail, Ordering::SeqCst);
        }

        fn track(&self, kind: MediaKind) -> LocalTrackHandle {
            let track = MockLocalTrack::new(kind);
            lock(&self.local_tracks).push(track.clone());
            track
        }
    }

    #[async_trait]
    impl RtcEngine for MockRtcEngine {
        fn create_client(
            &self,
            options: ClientOptions,
            events: Option<EventSender>,
        ) -> Result<Arc<dyn RtcClient>> {
            let mut clients = lock(&self.clients);
            let client = Arc::new(MockRtcClient::new(options, events));
            if !clients.is_empty() && self.fail_second_client_join.load(Ordering::SeqCst) {
                client.fail_join(true);
            }
            clients.push(client.clone());
            Ok(client)
        }

        async fn create_microphone_track(&self) -> Result<LocalTrackHandle> {
            Ok(self.track(MediaKind::Audio))
        }

        async fn create_camera_track(&self) -> Result<LocalTrackHandle> {
            if self.fail_camera.load(Ordering::SeqCst) {
                return Err(Error::sdk("camera permission denied"));
            }
            Ok(self.track(MediaKind::Video))
        }

        async fn create_screen_track(&self, encoder_profile: &str) -> Result<LocalTrackHandle> {
            if self.fail_screen.load(Ordering::SeqCst) {
                return Err(Error::sdk("screen capture cancelled"));
            }
            lock(&self.screen_profiles).push(encoder_profile.to_string());
            Ok(self.track(MediaKind::Video))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_emits_to_sender() {
            let engine = MockRtcEngine::new();
            let (tx, mut rx) = mpsc::unbounded_channel();
            engine
                .create_client(ClientOptions::default(), Some(tx))
                .unwrap();
            let client = engine.client(0).unwrap();

            assert!(client.emit(SessionEvent::Published {
                participant: RemoteParticipant::new(5),
                kind: MediaKind::Audio,
            }));
            assert!(matches!(
                rx.recv().await,
                Some(SessionEvent::Published {
                    kind: MediaKind::Audio,
                    ..
                })
            ));
        }

        #[tokio::test]
        async fn test_mock_subscribe_fills_missing_track() {
            let engine = MockRtcEngine::new();
            let client = engine.create_client(ClientOptions::default(), None).unwrap();
            let participant = RemoteParticipant::new(9);
            let subscribed = client.subscribe(&participant, MediaKind::Video).await.unwrap();
            assert!(subscribed.video_track.is_some());
            assert!(subscribed.audio_track.is_none());
        }

        #[tokio::test]
        async fn test_mock_publish_requires_join() {
            let engine = MockRtcEngine::new();
            let client = engine.create_client(ClientOptions::default(), None).unwrap();
            let track = engine.create_microphone_track().await.unwrap();
            assert!(client.publish(&[track]).await.is_err());
        }
    }
}
