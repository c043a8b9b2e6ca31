//! Conference shell: owns every session of a call and drives them from a
//! single task.
//!
//! UI commands, SDK events and chat messages arrive on separate queues and
//! are handled one at a time by [`run_conference`], so the reconciler and the
//! local session state never need locks.

use huddle_common::{ChatMessage, Error, InboundText, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::chat::{ChatConnector, ChatSession};
use crate::config::ClientConfig;
use crate::display::Display;
use crate::gateway::TokenSource;
use crate::media::MediaSession;
use crate::reconciler::Reconciler;
use crate::sdk::{EventReceiver, RtcEngine, SessionEvent};
use crate::session::LocalSession;
use crate::types::Uid;

pub const COMMAND_QUEUE_DEPTH: usize = 32;

pub struct Conference<D: Display> {
    config: ClientConfig,
    media: MediaSession,
    chat: ChatSession,
    tokens: Arc<dyn TokenSource>,
    reconciler: Reconciler<D>,
    session: LocalSession,
    username: String,
    messages: Vec<ChatMessage>,
    inbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl<D: Display> Conference<D> {
    /// Builds a conference around the given SDK bindings. The returned
    /// receiver carries the main client's remote events and is meant for
    /// [`run_conference`].
    pub fn new(
        config: ClientConfig,
        engine: Arc<dyn RtcEngine>,
        chat: Arc<dyn ChatConnector>,
        tokens: Arc<dyn TokenSource>,
        display: D,
    ) -> Result<(Self, EventReceiver)> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let media = MediaSession::new(engine, &config, event_tx)?;
        let reconciler = Reconciler::new(display, config.slot_capacity);
        let session = LocalSession::new(config.app_id.clone(), config.channel.clone());
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                config,
                media,
                chat: ChatSession::new(chat),
                tokens,
                reconciler,
                session,
                username: String::new(),
                messages: Vec::new(),
                inbound_tx,
                inbound_rx: Some(inbound_rx),
            },
            event_rx,
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &LocalSession {
        &self.session
    }

    pub fn reconciler(&self) -> &Reconciler<D> {
        &self.reconciler
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Chat history in the order it was recorded.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_chat_ready(&self) -> bool {
        self.chat.is_initialized()
    }

    pub fn set_display_name(&mut self, uid: Uid, name: impl Into<String>) {
        self.reconciler.set_display_name(uid, name);
    }

    /// Joins the configured channel under a fresh random uid.
    pub async fn join(&mut self) -> Result<Uid> {
        if self.session.is_joined() {
            return Err(Error::invalid_state("already joined"));
        }
        let uid = Uid::random();
        let token = self
            .tokens
            .channel_token(&uid, self.session.channel())
            .await
            .map_err(|e| {
                error!(%uid, "failed to fetch channel token: {}", e);
                e
            })?;
        self.media.join(&mut self.session, uid, Some(token)).await
    }

    /// Leaves the call and tears down everything tied to it. Local state is
    /// reset even when the SDK rejects the leave; the rejection is returned.
    pub async fn leave(&mut self) -> Result<()> {
        if !self.session.is_joined() {
            debug!("leave ignored, not joined");
            return Ok(());
        }
        if self.session.is_screen_sharing() || self.media.is_screen_client_active() {
            if let Err(e) = self.media.stop_screen_share(&mut self.session).await {
                warn!("screen share teardown failed: {}", e);
            }
            self.reconciler.hide_screen_share();
        }
        let result = self.media.leave(&mut self.session).await;
        self.reconciler.clear();
        self.session.reset();
        result
    }

    /// Flips microphone enablement. Returns the resulting muted flag, which
    /// only changes when a microphone track exists.
    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.session.is_muted();
        if self.media.set_audio_enabled(&self.session, muted) {
            self.session.is_muted = !muted;
            info!(muted = self.session.is_muted, "microphone toggled");
        } else {
            debug!("no microphone track to toggle");
        }
        self.session.is_muted
    }

    /// Flips camera enablement. Returns the resulting camera-off flag.
    pub fn toggle_camera(&mut self) -> bool {
        let off = self.session.is_camera_off();
        if self.media.set_video_enabled(&self.session, off) {
            self.session.is_camera_off = !off;
            info!(camera_off = self.session.is_camera_off, "camera toggled");
        } else {
            debug!("no camera track to toggle");
        }
        self.session.is_camera_off
    }

    /// Starts or stops screen sharing and returns the new sharing flag. A
    /// failed start leaves the flag false and the main call untouched.
    pub async fn toggle_screen_share(&mut self) -> Result<bool> {
        if self.session.is_screen_sharing() {
            if let Err(e) = self.media.stop_screen_share(&mut self.session).await {
                warn!("error stopping screen share: {}", e);
            }
            self.reconciler.hide_screen_share();
            self.session.is_screen_sharing = false;
            return Ok(false);
        }

        let Some(uid) = self.session.uid() else {
            return Err(Error::invalid_state("join before sharing the screen"));
        };
        let screen_uid = uid.screen_share();
        let token = self
            .tokens
            .channel_token(&screen_uid, self.session.channel())
            .await
            .map_err(|e| {
                error!(uid = %screen_uid, "failed to fetch screen share token: {}", e);
                e
            })?;

        self.media
            .start_screen_share(&mut self.session, screen_uid, Some(token))
            .await?;
        self.session.is_screen_sharing = true;
        if let Some(track) = self.session.tracks.screen.clone() {
            self.reconciler.show_screen_share(&track);
        }
        Ok(true)
    }

    /// Logs `user` into chat. Inbound messages are delivered to the
    /// conference loop from then on.
    pub async fn login_chat(&mut self, user: &str) -> Result<()> {
        let token = self.tokens.user_token(user).await.map_err(|e| {
            error!(user, "failed to fetch chat token: {}", e);
            e
        })?;
        self.chat
            .initialize(self.config.chat_app_key(), user, &token)
            .await?;

        let inbound = self.inbound_tx.clone();
        self.chat
            .on_message_received(Box::new(move |message: InboundText| {
                if inbound.send(message.msg).is_err() {
                    debug!("conference gone, chat message dropped");
                }
            }));
        if self.username.is_empty() {
            self.username = user.to_string();
        }
        Ok(())
    }

    /// Records a chat line locally and sends it to the channel. Blank input
    /// is ignored. The line stays in the history even if the send fails.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            debug!("blank message ignored");
            return Ok(());
        }
        let message = ChatMessage {
            user: self.username.clone(),
            text: text.to_string(),
        };
        let payload = message.to_json()?;
        self.messages.push(message);
        self.chat
            .send_message(&self.config.channel, &payload)
            .await
    }

    /// Appends an inbound chat payload to the history. Returns false when the
    /// payload is not a chat line.
    pub fn receive_message(&mut self, raw: &str) -> bool {
        match ChatMessage::from_json(raw) {
            Ok(message) => {
                debug!(user = %message.user, "message received");
                self.messages.push(message);
                true
            }
            Err(e) => {
                warn!("dropping undecodable chat payload: {}", e);
                false
            }
        }
    }

    pub fn mute_remote(&mut self, uid: &Uid) -> bool {
        self.reconciler.mute_remote(uid)
    }

    /// Applies a remote SDK event to the layout. Publishes that arrive after
    /// the session left are dropped, since nothing would tear them down.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Published { participant, kind } => {
                if !self.session.is_joined() {
                    debug!(uid = %participant.uid, %kind, "not joined, publish dropped");
                    return;
                }
                match self.media.subscribe(&participant, kind).await {
                    Ok(subscribed) => {
                        self.reconciler
                            .on_published(&self.session, &subscribed, kind)
                    }
                    Err(e) => {
                        warn!(uid = %participant.uid, %kind, "subscribe failed: {}", e);
                    }
                }
            }
            SessionEvent::Unpublished { participant, kind } => {
                self.reconciler.on_unpublished(&participant, kind);
            }
        }
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Join(reply) => {
                let _ = reply.send(self.join().await);
            }
            Command::Leave(reply) => {
                let _ = reply.send(self.leave().await);
            }
            Command::ToggleMute(reply) => {
                let _ = reply.send(self.toggle_mute());
            }
            Command::ToggleCamera(reply) => {
                let _ = reply.send(self.toggle_camera());
            }
            Command::ToggleScreenShare(reply) => {
                let _ = reply.send(self.toggle_screen_share().await);
            }
            Command::LoginChat { user, reply } => {
                let _ = reply.send(self.login_chat(&user).await);
            }
            Command::SetUsername(name) => self.set_username(name),
            Command::SendMessage { text, reply } => {
                let _ = reply.send(self.send_message(&text).await);
            }
            Command::MuteRemote { uid, reply } => {
                let _ = reply.send(self.mute_remote(&uid));
            }
            Command::SetDisplayName { uid, name } => self.set_display_name(uid, name),
            Command::History(reply) => {
                let _ = reply.send(self.messages.clone());
            }
        }
    }
}

/// A UI request for the conference loop. Requests that can fail or report
/// state carry a reply channel.
#[derive(Debug)]
pub enum Command {
    Join(oneshot::Sender<Result<Uid>>),
    Leave(oneshot::Sender<Result<()>>),
    ToggleMute(oneshot::Sender<bool>),
    ToggleCamera(oneshot::Sender<bool>),
    ToggleScreenShare(oneshot::Sender<Result<bool>>),
    LoginChat {
        user: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetUsername(String),
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    MuteRemote {
        uid: Uid,
        reply: oneshot::Sender<bool>,
    },
    SetDisplayName {
        uid: Uid,
        name: String,
    },
    History(oneshot::Sender<Vec<ChatMessage>>),
}

/// Cloneable sender side of the command queue.
#[derive(Debug, Clone)]
pub struct ConferenceHandle {
    tx: mpsc::Sender<Command>,
}

impl ConferenceHandle {
    pub fn channel() -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    pub async fn join(&self) -> Result<Uid> {
        self.request(Command::Join).await?
    }

    pub async fn leave(&self) -> Result<()> {
        self.request(Command::Leave).await?
    }

    pub async fn toggle_mute(&self) -> Result<bool> {
        self.request(Command::ToggleMute).await
    }

    pub async fn toggle_camera(&self) -> Result<bool> {
        self.request(Command::ToggleCamera).await
    }

    pub async fn toggle_screen_share(&self) -> Result<bool> {
        self.request(Command::ToggleScreenShare).await?
    }

    pub async fn login_chat(&self, user: impl Into<String>) -> Result<()> {
        let user = user.into();
        self.request(|reply| Command::LoginChat { user, reply })
            .await?
    }

    pub async fn set_username(&self, name: impl Into<String>) -> Result<()> {
        self.send(Command::SetUsername(name.into())).await
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| Command::SendMessage { text, reply })
            .await?
    }

    pub async fn mute_remote(&self, uid: Uid) -> Result<bool> {
        self.request(|reply| Command::MuteRemote { uid, reply }).await
    }

    pub async fn set_display_name(&self, uid: Uid, name: impl Into<String>) -> Result<()> {
        self.send(Command::SetDisplayName {
            uid,
            name: name.into(),
        })
        .await
    }

    /// Snapshot of the chat history.
    pub async fn messages(&self) -> Result<Vec<ChatMessage>> {
        self.request(Command::History).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await
            .map_err(|_| Error::internal("conference dropped the request"))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::internal("conference loop is not running"))
    }
}

/// Drives a conference until `shutdown` fires or its sender is dropped, then
/// leaves the call, closes chat and hands the conference back.
///
/// Queues are served in priority order: shutdown, UI commands, SDK events,
/// chat messages. Each queue is consumed in order.
pub async fn run_conference<D: Display>(
    mut conference: Conference<D>,
    mut commands: mpsc::Receiver<Command>,
    mut events: EventReceiver,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<Conference<D>> {
    let mut inbound = conference
        .inbound_rx
        .take()
        .ok_or_else(|| Error::invalid_state("conference loop already running"))?;
    info!(channel = %conference.config.channel, "conference loop started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("conference shutdown requested");
                break;
            }

            Some(command) = commands.recv() => {
                conference.dispatch(command).await;
            }

            Some(event) = events.recv() => {
                conference.handle_event(event).await;
            }

            Some(raw) = inbound.recv() => {
                conference.receive_message(&raw);
            }

            else => break,
        }
    }

    if let Err(e) = conference.leave().await {
        warn!("leave on shutdown failed: {}", e);
    }
    conference.chat.close().await;
    conference.inbound_rx = Some(inbound);
    info!("conference loop stopped");
    Ok(conference)
}
