//! Local session state.
//!
//! Only join/leave/toggle operations mutate this; the reconciler reads it.

use crate::sdk::LocalTrackHandle;
use crate::types::Uid;

#[derive(Debug, Default)]
pub struct LocalTracks {
    pub audio: Option<LocalTrackHandle>,
    pub video: Option<LocalTrackHandle>,
    pub screen: Option<LocalTrackHandle>,
}

#[derive(Debug, Default)]
pub struct LocalSession {
    app_id: String,
    channel: String,
    pub(crate) uid: Option<Uid>,
    pub(crate) token: Option<String>,
    pub(crate) screen_uid: Option<Uid>,
    pub(crate) is_screen_sharing: bool,
    pub(crate) is_muted: bool,
    pub(crate) is_camera_off: bool,
    pub(crate) tracks: LocalTracks,
}

impl LocalSession {
    pub fn new(app_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn screen_uid(&self) -> Option<&Uid> {
        self.screen_uid.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.uid.is_some()
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.is_screen_sharing
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn is_camera_off(&self) -> bool {
        self.is_camera_off
    }

    pub fn tracks(&self) -> &LocalTracks {
        &self.tracks
    }

    /// Forgets everything tied to the current call. Tracks must already be
    /// closed by the media session.
    pub(crate) fn reset(&mut self) {
        self.uid = None;
        self.token = None;
        self.screen_uid = None;
        self.is_screen_sharing = false;
        self.is_muted = false;
        self.is_camera_off = false;
        self.tracks = LocalTracks::default();
    }
}
