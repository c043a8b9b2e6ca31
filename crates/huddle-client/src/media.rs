//! Media session wrapper over the RTC SDK.
//!
//! One main client carries the call and reports remote activity; a second,
//! event-less client carries the screen share under its own uid.

use huddle_common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::sdk::{ClientOptions, EventSender, LocalTrackHandle, RtcClient, RtcEngine};
use crate::session::LocalSession;
use crate::types::{ContainerKey, MediaKind, RemoteParticipant, Uid};

pub struct MediaSession {
    engine: Arc<dyn RtcEngine>,
    client: Arc<dyn RtcClient>,
    screen_client: Option<Arc<dyn RtcClient>>,
    screen_encoder_profile: String,
}

impl MediaSession {
    pub fn new(
        engine: Arc<dyn RtcEngine>,
        config: &ClientConfig,
        events: EventSender,
    ) -> Result<Self> {
        let client = engine.create_client(ClientOptions::default(), Some(events))?;
        Ok(Self {
            engine,
            client,
            screen_client: None,
            screen_encoder_profile: config.screen_encoder_profile.clone(),
        })
    }

    pub fn is_screen_client_active(&self) -> bool {
        self.screen_client.is_some()
    }

    /// Joins the session's channel, publishes microphone and camera, and
    /// previews the camera locally. On success the session records the
    /// joined uid, token and tracks.
    pub async fn join(
        &mut self,
        session: &mut LocalSession,
        uid: Uid,
        token: Option<String>,
    ) -> Result<Uid> {
        let joined = self
            .client
            .join(session.app_id(), session.channel(), token.as_deref(), &uid)
            .await
            .map_err(|e| {
                error!(channel = session.channel(), %uid, "error joining channel: {}", e);
                e
            })?;

        let (audio, video) = match self.create_local_tracks().await {
            Ok(tracks) => tracks,
            Err(e) => {
                error!("error creating local tracks: {}", e);
                self.rollback_join(&[]).await;
                return Err(e);
            }
        };

        if let Err(e) = self.client.publish(&[audio.clone(), video.clone()]).await {
            error!("error publishing local tracks: {}", e);
            self.rollback_join(&[audio, video]).await;
            return Err(e);
        }

        video.play(&ContainerKey::local_player());
        info!(channel = session.channel(), uid = %joined, "joined channel");

        session.uid = Some(joined.clone());
        session.token = token;
        session.tracks.audio = Some(audio);
        session.tracks.video = Some(video);
        Ok(joined)
    }

    /// Closes the local microphone and camera and leaves the channel. The
    /// tracks are released even when the SDK rejects the leave.
    pub async fn leave(&mut self, session: &mut LocalSession) -> Result<()> {
        for track in [session.tracks.audio.take(), session.tracks.video.take()]
            .into_iter()
            .flatten()
        {
            track.close();
        }
        match self.client.leave().await {
            Ok(()) => {
                info!(channel = session.channel(), "left channel");
                Ok(())
            }
            Err(e) => {
                warn!(channel = session.channel(), "error leaving channel: {}", e);
                Err(e)
            }
        }
    }

    pub async fn subscribe(
        &self,
        participant: &RemoteParticipant,
        kind: MediaKind,
    ) -> Result<RemoteParticipant> {
        let subscribed = self.client.subscribe(participant, kind).await?;
        debug!(uid = %participant.uid, %kind, "subscribed");
        Ok(subscribed)
    }

    /// Returns false when there is no microphone track to toggle.
    pub fn set_audio_enabled(&self, session: &LocalSession, enabled: bool) -> bool {
        set_enabled(session.tracks.audio.as_ref(), enabled)
    }

    /// Returns false when there is no camera track to toggle.
    pub fn set_video_enabled(&self, session: &LocalSession, enabled: bool) -> bool {
        set_enabled(session.tracks.video.as_ref(), enabled)
    }

    /// Publishes the screen through a dedicated client joined as `screen_uid`.
    pub async fn start_screen_share(
        &mut self,
        session: &mut LocalSession,
        screen_uid: Uid,
        token: Option<String>,
    ) -> Result<()> {
        if self.screen_client.is_some() {
            return Err(Error::invalid_state("screen share already running"));
        }

        let client = self.engine.create_client(ClientOptions::default(), None)?;
        let track = self
            .engine
            .create_screen_track(&self.screen_encoder_profile)
            .await
            .map_err(|e| {
                error!("error creating screen track: {}", e);
                e
            })?;

        let joined = match client
            .join(session.app_id(), session.channel(), token.as_deref(), &screen_uid)
            .await
        {
            Ok(uid) => uid,
            Err(e) => {
                error!(uid = %screen_uid, "error joining for screen share: {}", e);
                track.close();
                return Err(e);
            }
        };

        if let Err(e) = client.publish(std::slice::from_ref(&track)).await {
            error!(uid = %joined, "error publishing screen track: {}", e);
            track.close();
            if let Err(e) = client.leave().await {
                debug!("screen client leave failed: {}", e);
            }
            return Err(e);
        }

        info!(uid = %joined, profile = %self.screen_encoder_profile, "screen share started");
        session.screen_uid = Some(joined);
        session.tracks.screen = Some(track);
        self.screen_client = Some(client);
        Ok(())
    }

    /// Closes the screen track and leaves the screen client. Missing pieces
    /// are skipped.
    pub async fn stop_screen_share(&mut self, session: &mut LocalSession) -> Result<()> {
        if let Some(track) = session.tracks.screen.take() {
            track.close();
        }
        session.screen_uid = None;

        let Some(client) = self.screen_client.take() else {
            return Ok(());
        };
        match client.leave().await {
            Ok(()) => {
                info!("screen share stopped");
                Ok(())
            }
            Err(e) => {
                warn!("error leaving screen client: {}", e);
                Err(e)
            }
        }
    }

    async fn create_local_tracks(&self) -> Result<(LocalTrackHandle, LocalTrackHandle)> {
        let audio = self.engine.create_microphone_track().await?;
        match self.engine.create_camera_track().await {
            Ok(video) => Ok((audio, video)),
            Err(e) => {
                audio.close();
                Err(e)
            }
        }
    }

    async fn rollback_join(&self, tracks: &[LocalTrackHandle]) {
        for track in tracks {
            track.close();
        }
        if let Err(e) = self.client.leave().await {
            debug!("leave after failed join: {}", e);
        }
    }
}

fn set_enabled(track: Option<&LocalTrackHandle>, enabled: bool) -> bool {
    match track {
        Some(track) => {
            track.set_enabled(enabled);
            true
        }
        None => false,
    }
}
