//! Huddle client core.
//!
//! Token gateway client, chat and media session wrappers over vendor SDK
//! seams, and the reconciler that keeps the participant layout in step with
//! remote publish/unpublish events.

#![forbid(unsafe_code)]

pub mod chat;
pub mod conference;
pub mod config;
pub mod display;
pub mod gateway;
mod helpers;
pub mod media;
pub mod reconciler;
pub mod sdk;
pub mod session;
pub mod types;

pub use chat::{ChatConnection, ChatConnector, ChatSession};
pub use conference::{run_conference, Command, Conference, ConferenceHandle};
pub use config::ClientConfig;
pub use display::{ContainerDecor, Display, DisplayError, Indicator, Placement, TracingDisplay};
pub use gateway::{TokenGateway, TokenSource};
pub use media::MediaSession;
pub use reconciler::{ParticipantState, Reconciler};
pub use sdk::{
    ClientOptions, EventReceiver, EventSender, LocalTrack, LocalTrackHandle, RemoteTrack,
    RtcClient, RtcEngine, SessionEvent,
};
pub use session::{LocalSession, LocalTracks};
pub use types::{ContainerKey, MediaKind, RemoteParticipant, RemoteTrackHandle, Uid};
