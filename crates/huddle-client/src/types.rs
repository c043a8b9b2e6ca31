use rand::Rng as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::sdk::RemoteTrack;

/// Upper bound (exclusive) for randomly assigned local uids.
pub const MAX_RANDOM_UID: u32 = 10_000;

/// Per-participant identifier assigned at join time, scoped to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uid {
    Number(u32),
    Name(String),
}

impl Uid {
    /// A fresh uid in `0..MAX_RANDOM_UID`.
    pub fn random() -> Self {
        Self::Number(rand::thread_rng().gen_range(0..MAX_RANDOM_UID))
    }

    /// Identity used by the screen-share session: the uid's text with `1`
    /// appended, so `4711` shares as `"47111"`.
    pub fn screen_share(&self) -> Self {
        Self::Name(format!("{}1", self))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<u32> for Uid {
    fn from(value: u32) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

pub type RemoteTrackHandle = Arc<dyn RemoteTrack>;

/// A remote participant as reported by the RTC SDK. Track handles are only
/// present once the matching subscription has completed.
#[derive(Clone)]
pub struct RemoteParticipant {
    pub uid: Uid,
    pub has_audio: bool,
    pub has_video: bool,
    pub audio_track: Option<RemoteTrackHandle>,
    pub video_track: Option<RemoteTrackHandle>,
}

impl RemoteParticipant {
    pub fn new(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            has_audio: false,
            has_video: false,
            audio_track: None,
            video_track: None,
        }
    }

    pub fn with_audio(mut self, track: RemoteTrackHandle) -> Self {
        self.has_audio = true;
        self.audio_track = Some(track);
        self
    }

    pub fn with_video(mut self, track: RemoteTrackHandle) -> Self {
        self.has_video = true;
        self.video_track = Some(track);
        self
    }

    pub fn track(&self, kind: MediaKind) -> Option<&RemoteTrackHandle> {
        match kind {
            MediaKind::Audio => self.audio_track.as_ref(),
            MediaKind::Video => self.video_track.as_ref(),
        }
    }
}

impl fmt::Debug for RemoteParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteParticipant")
            .field("uid", &self.uid)
            .field("has_audio", &self.has_audio)
            .field("has_video", &self.has_video)
            .field("audio_track", &self.audio_track.is_some())
            .field("video_track", &self.video_track.is_some())
            .finish()
    }
}

/// Key of a UI container. At most one container exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey(String);

impl ContainerKey {
    pub const SCREEN_SHARE: &'static str = "screen-share-container";
    pub const LOCAL_PLAYER: &'static str = "local-player";

    pub fn remote(uid: &Uid) -> Self {
        Self(format!("remote-{}", uid))
    }

    pub fn screen_share() -> Self {
        Self(Self::SCREEN_SHARE.to_string())
    }

    pub fn local_player() -> Self {
        Self(Self::LOCAL_PLAYER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
