//! Participant/track lifecycle reconciler.
//!
//! Maps `published` / `unpublished` notifications onto container state. It
//! runs on the event-delivery task, never blocks and never fails: display
//! inconsistencies are logged at debug and absorbed, because the SDK event
//! stream is the source of truth.
//!
//! Layout model:
//! - one container per key (`remote-<uid>`, screen share)
//! - a slot pool of fixed capacity, filled first-fit in slot order
//! - an overflow area for containers that find no free slot, in arrival order

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::display::{ContainerDecor, Display, DisplayError, Indicator, Placement};
use crate::sdk::LocalTrackHandle;
use crate::session::LocalSession;
use crate::types::{ContainerKey, MediaKind, RemoteParticipant, RemoteTrackHandle, Uid};

/// Which remote media of a participant the reconciler currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Unknown,
    AudioActive,
    VideoActive,
    Both,
}

#[derive(Debug, Default)]
struct ParticipantTracks {
    audio: Option<RemoteTrackHandle>,
    video: Option<RemoteTrackHandle>,
}

impl ParticipantTracks {
    fn state(&self) -> ParticipantState {
        match (self.audio.is_some(), self.video.is_some()) {
            (false, false) => ParticipantState::Unknown,
            (true, false) => ParticipantState::AudioActive,
            (false, true) => ParticipantState::VideoActive,
            (true, true) => ParticipantState::Both,
        }
    }
}

pub struct Reconciler<D: Display> {
    display: D,
    slots: Vec<Option<ContainerKey>>,
    overflow: Vec<ContainerKey>,
    containers: HashMap<ContainerKey, Placement>,
    participants: HashMap<Uid, ParticipantTracks>,
    names: HashMap<Uid, String>,
}

impl<D: Display> Reconciler<D> {
    pub fn new(display: D, slot_capacity: usize) -> Self {
        Self {
            display,
            slots: vec![None; slot_capacity],
            overflow: Vec::new(),
            containers: HashMap::new(),
            participants: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    /// Label used by the name tag of containers created from now on.
    pub fn set_display_name(&mut self, uid: Uid, name: impl Into<String>) {
        self.names.insert(uid, name.into());
    }

    pub fn on_published(
        &mut self,
        session: &LocalSession,
        participant: &RemoteParticipant,
        kind: MediaKind,
    ) {
        debug!(uid = %participant.uid, %kind, "published");
        match kind {
            MediaKind::Audio => self.start_audio(participant),
            MediaKind::Video => {
                if self.has_container(&participant.uid) {
                    debug!(uid = %participant.uid, "container already present, keeping its track");
                    return;
                }
                if let Some(track) = participant.video_track.clone() {
                    let held = &mut self
                        .participants
                        .entry(participant.uid.clone())
                        .or_default()
                        .video;
                    stop_replaced(held.replace(track.clone()), &track);
                }
                if session.is_screen_sharing() {
                    debug!(uid = %participant.uid, "screen share active, container suppressed");
                    return;
                }
                self.attach_video(participant);
            }
        }
    }

    pub fn on_unpublished(&mut self, participant: &RemoteParticipant, kind: MediaKind) {
        debug!(uid = %participant.uid, %kind, "unpublished");
        let uid = &participant.uid;
        let held = self
            .participants
            .get_mut(uid)
            .and_then(|tracks| match kind {
                MediaKind::Audio => tracks.audio.take(),
                MediaKind::Video => tracks.video.take(),
            });
        if let Some(track) = held.as_ref().or_else(|| participant.track(kind)) {
            track.stop();
        }

        if kind == MediaKind::Video {
            self.remove_container(&ContainerKey::remote(uid));
        }

        if self
            .participants
            .get(uid)
            .is_some_and(|t| t.state() == ParticipantState::Unknown)
        {
            self.participants.remove(uid);
        }
    }

    /// Per-participant mute control: silences a playing remote audio track
    /// locally and marks the container as muted.
    pub fn mute_remote(&mut self, uid: &Uid) -> bool {
        let Some(track) = self.participants.get(uid).and_then(|t| t.audio.clone()) else {
            return false;
        };
        if !track.is_playing() {
            return false;
        }
        track.stop();
        let key = ContainerKey::remote(uid);
        if self.containers.contains_key(&key) {
            absorb(
                "set_indicator",
                self.display.set_indicator(&key, Indicator::Mute, true),
            );
        }
        info!(%uid, "remote audio muted locally");
        true
    }

    /// Shows the local screen track on the stage.
    pub fn show_screen_share(&mut self, track: &LocalTrackHandle) {
        let key = ContainerKey::screen_share();
        if self.containers.contains_key(&key) {
            return;
        }
        let decor = ContainerDecor {
            label: "screen share".into(),
            muted: false,
            camera_off: false,
        };
        if absorb(
            "create_slot",
            self.display.create_slot(&key, Placement::Stage, &decor),
        ) {
            self.containers.insert(key.clone(), Placement::Stage);
            track.play(&key);
        }
    }

    pub fn hide_screen_share(&mut self) {
        self.remove_container(&ContainerKey::screen_share());
    }

    /// Session-leave teardown: stops every remote track and removes every
    /// container.
    pub fn clear(&mut self) {
        for (_, tracks) in self.participants.drain() {
            for track in tracks.audio.iter().chain(tracks.video.iter()) {
                track.stop();
            }
        }
        let mut keys: Vec<ContainerKey> = self.containers.keys().cloned().collect();
        keys.sort();
        for key in keys {
            self.remove_container(&key);
        }
        info!("layout cleared");
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn has_container(&self, uid: &Uid) -> bool {
        self.containers.contains_key(&ContainerKey::remote(uid))
    }

    pub fn has_screen_share(&self) -> bool {
        self.containers.contains_key(&ContainerKey::screen_share())
    }

    pub fn slot_of(&self, uid: &Uid) -> Option<usize> {
        match self.containers.get(&ContainerKey::remote(uid)) {
            Some(Placement::Slot(index)) => Some(*index),
            _ => None,
        }
    }

    /// Slot pool contents in slot order.
    pub fn slots(&self) -> &[Option<ContainerKey>] {
        &self.slots
    }

    /// Overflow contents in arrival order.
    pub fn overflow(&self) -> &[ContainerKey] {
        &self.overflow
    }

    pub fn participant_state(&self, uid: &Uid) -> ParticipantState {
        self.participants
            .get(uid)
            .map(ParticipantTracks::state)
            .unwrap_or(ParticipantState::Unknown)
    }

    fn start_audio(&mut self, participant: &RemoteParticipant) {
        let Some(track) = participant.audio_track.clone() else {
            debug!(uid = %participant.uid, "no audio track to play");
            return;
        };
        let held = &mut self
            .participants
            .entry(participant.uid.clone())
            .or_default()
            .audio;
        stop_replaced(held.replace(track.clone()), &track);
        track.play(None);
    }

    fn attach_video(&mut self, participant: &RemoteParticipant) {
        let key = ContainerKey::remote(&participant.uid);
        if self.containers.contains_key(&key) {
            debug!(container = %key, "container already present");
            return;
        }

        let decor = ContainerDecor {
            label: self
                .names
                .get(&participant.uid)
                .cloned()
                .unwrap_or_else(|| participant.uid.to_string()),
            muted: !participant.has_audio,
            camera_off: !participant.has_video,
        };
        let placement = self.next_placement();
        if !absorb(
            "create_slot",
            self.display.create_slot(&key, placement, &decor),
        ) {
            return;
        }
        self.occupy(&key, placement);

        match participant.video_track.as_ref().filter(|_| participant.has_video) {
            Some(track) => {
                if absorb("render_track_into", self.display.render_track_into(&key, track)) {
                    track.play(Some(&key));
                }
            }
            None => {
                absorb(
                    "render_placeholder_into",
                    self.display.render_placeholder_into(&key),
                );
            }
        }
        info!(container = %key, ?placement, "participant attached");
    }

    fn next_placement(&self) -> Placement {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(Placement::Slot)
            .unwrap_or(Placement::Overflow)
    }

    fn occupy(&mut self, key: &ContainerKey, placement: Placement) {
        match placement {
            Placement::Slot(index) => {
                if let Some(slot) = self.slots.get_mut(index) {
                    *slot = Some(key.clone());
                }
            }
            Placement::Overflow => self.overflow.push(key.clone()),
            Placement::Stage => {}
        }
        self.containers.insert(key.clone(), placement);
    }

    fn remove_container(&mut self, key: &ContainerKey) {
        let Some(placement) = self.containers.remove(key) else {
            debug!(container = %key, "no container to remove");
            return;
        };
        match placement {
            Placement::Slot(index) => {
                if let Some(slot) = self.slots.get_mut(index) {
                    *slot = None;
                }
            }
            Placement::Overflow => self.overflow.retain(|k| k != key),
            Placement::Stage => {}
        }
        absorb("remove_slot", self.display.remove_slot(key));
    }
}

/// Stops a previously held track that a new handle superseded.
fn stop_replaced(previous: Option<RemoteTrackHandle>, current: &RemoteTrackHandle) {
    if let Some(previous) = previous {
        if !Arc::ptr_eq(&previous, current) {
            previous.stop();
        }
    }
}

/// Logs a display failure and reports whether the call succeeded.
fn absorb(op: &str, result: Result<(), DisplayError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(op, error = %e, "display call absorbed");
            false
        }
    }
}
