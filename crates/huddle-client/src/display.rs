//! Display capability: keyed container insertion/removal and rendering.
//!
//! The reconciler never touches a concrete UI toolkit. Anything that can
//! insert and remove keyed regions and bind a track to one can host a call.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::types::{ContainerKey, RemoteTrackHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("no display target for {0}")]
    MissingTarget(ContainerKey),
    #[error("display rejected {key}: {reason}")]
    Rejected { key: ContainerKey, reason: String },
}

/// Where a new container is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Index into the slot pool.
    Slot(usize),
    /// The overflow area used once every slot is taken.
    Overflow,
    /// The shared stage used by screen share.
    Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Mute,
    Camera,
}

/// Decoration rendered alongside a participant's surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDecor {
    pub label: String,
    pub muted: bool,
    pub camera_off: bool,
}

pub trait Display: Send {
    fn create_slot(
        &mut self,
        key: &ContainerKey,
        placement: Placement,
        decor: &ContainerDecor,
    ) -> Result<(), DisplayError>;

    fn remove_slot(&mut self, key: &ContainerKey) -> Result<(), DisplayError>;

    /// Binds a video surface for `track` inside the container. Playback is
    /// started separately by the caller.
    fn render_track_into(
        &mut self,
        key: &ContainerKey,
        track: &RemoteTrackHandle,
    ) -> Result<(), DisplayError>;

    fn render_placeholder_into(&mut self, key: &ContainerKey) -> Result<(), DisplayError>;

    fn set_indicator(
        &mut self,
        key: &ContainerKey,
        indicator: Indicator,
        active: bool,
    ) -> Result<(), DisplayError>;
}

/// Headless display that keeps a keyed model of the layout and logs every
/// mutation. Useful for terminals and bots.
#[derive(Debug, Default)]
pub struct TracingDisplay {
    containers: HashMap<ContainerKey, Placement>,
    placeholder: String,
}

impl TracingDisplay {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            containers: HashMap::new(),
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.placeholder_image.clone())
    }

    pub fn placement(&self, key: &ContainerKey) -> Option<Placement> {
        self.containers.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    fn require(&self, key: &ContainerKey) -> Result<(), DisplayError> {
        if self.containers.contains_key(key) {
            Ok(())
        } else {
            Err(DisplayError::MissingTarget(key.clone()))
        }
    }
}

impl Display for TracingDisplay {
    fn create_slot(
        &mut self,
        key: &ContainerKey,
        placement: Placement,
        decor: &ContainerDecor,
    ) -> Result<(), DisplayError> {
        if self.containers.contains_key(key) {
            return Err(DisplayError::Rejected {
                key: key.clone(),
                reason: "already present".into(),
            });
        }
        info!(
            container = %key,
            ?placement,
            label = %decor.label,
            muted = decor.muted,
            camera_off = decor.camera_off,
            "container created"
        );
        self.containers.insert(key.clone(), placement);
        Ok(())
    }

    fn remove_slot(&mut self, key: &ContainerKey) -> Result<(), DisplayError> {
        match self.containers.remove(key) {
            Some(_) => {
                info!(container = %key, "container removed");
                Ok(())
            }
            None => Err(DisplayError::MissingTarget(key.clone())),
        }
    }

    fn render_track_into(
        &mut self,
        key: &ContainerKey,
        track: &RemoteTrackHandle,
    ) -> Result<(), DisplayError> {
        self.require(key)?;
        debug!(container = %key, kind = %track.kind(), "track bound");
        Ok(())
    }

    fn render_placeholder_into(&mut self, key: &ContainerKey) -> Result<(), DisplayError> {
        self.require(key)?;
        debug!(container = %key, image = %self.placeholder, "placeholder shown");
        Ok(())
    }

    fn set_indicator(
        &mut self,
        key: &ContainerKey,
        indicator: Indicator,
        active: bool,
    ) -> Result<(), DisplayError> {
        self.require(key)?;
        debug!(container = %key, ?indicator, active, "indicator updated");
        Ok(())
    }
}

/// Recording display double.
pub mod mock {
    use super::*;
    use crate::helpers::lock;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DisplayCall {
        CreateSlot {
            key: ContainerKey,
            placement: Placement,
            decor: ContainerDecor,
        },
        RemoveSlot(ContainerKey),
        RenderTrack(ContainerKey),
        RenderPlaceholder(ContainerKey),
        SetIndicator {
            key: ContainerKey,
            indicator: Indicator,
            active: bool,
        },
    }

    #[derive(Debug, Default)]
    struct Inner {
        calls: Vec<DisplayCall>,
        live: HashMap<ContainerKey, Placement>,
        failing: HashSet<ContainerKey>,
    }

    /// Records every call. Clones share the same log, so a test can keep a
    /// handle after moving the display into a reconciler.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingDisplay {
        inner: Arc<Mutex<Inner>>,
    }

    impl RecordingDisplay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<DisplayCall> {
            lock(&self.inner).calls.clone()
        }

        pub fn clear_calls(&self) {
            lock(&self.inner).calls.clear();
        }

        /// Containers currently attached, with their placement.
        pub fn live(&self) -> HashMap<ContainerKey, Placement> {
            lock(&self.inner).live.clone()
        }

        pub fn is_live(&self, key: &ContainerKey) -> bool {
            lock(&self.inner).live.contains_key(key)
        }

        /// Every subsequent call touching `key` fails with `Rejected`.
        pub fn fail_for(&self, key: ContainerKey) {
            lock(&self.inner).failing.insert(key);
        }

        pub fn create_count(&self, key: &ContainerKey) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, DisplayCall::CreateSlot { key: k, .. } if k == key))
                .count()
        }

        fn record(&self, call: DisplayCall, key: &ContainerKey) -> Result<(), DisplayError> {
            let mut inner = lock(&self.inner);
            inner.calls.push(call);
            if inner.failing.contains(key) {
                return Err(DisplayError::Rejected {
                    key: key.clone(),
                    reason: "injected failure".into(),
                });
            }
            Ok(())
        }
    }

    impl Display for RecordingDisplay {
        fn create_slot(
            &mut self,
            key: &ContainerKey,
            placement: Placement,
            decor: &ContainerDecor,
        ) -> Result<(), DisplayError> {
            self.record(
                DisplayCall::CreateSlot {
                    key: key.clone(),
                    placement,
                    decor: decor.clone(),
                },
                key,
            )?;
            lock(&self.inner).live.insert(key.clone(), placement);
            Ok(())
        }

        fn remove_slot(&mut self, key: &ContainerKey) -> Result<(), DisplayError> {
            self.record(DisplayCall::RemoveSlot(key.clone()), key)?;
            match lock(&self.inner).live.remove(key) {
                Some(_) => Ok(()),
                None => Err(DisplayError::MissingTarget(key.clone())),
            }
        }

        fn render_track_into(
            &mut self,
            key: &ContainerKey,
            _track: &RemoteTrackHandle,
        ) -> Result<(), DisplayError> {
            self.record(DisplayCall::RenderTrack(key.clone()), key)
        }

        fn render_placeholder_into(&mut self, key: &ContainerKey) -> Result<(), DisplayError> {
            self.record(DisplayCall::RenderPlaceholder(key.clone()), key)
        }

        fn set_indicator(
            &mut self,
            key: &ContainerKey,
            indicator: Indicator,
            active: bool,
        ) -> Result<(), DisplayError> {
            self.record(
                DisplayCall::SetIndicator {
                    key: key.clone(),
                    indicator,
                    active,
                },
                key,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::mock::MockRemoteTrack;
    use crate::types::Uid;

    fn decor() -> ContainerDecor {
        ContainerDecor {
            label: "42".into(),
            muted: false,
            camera_off: false,
        }
    }

    #[test]
    fn test_tracing_display_tracks_containers() {
        let mut display = TracingDisplay::new("/public/img1.jpg");
        let key = ContainerKey::remote(&Uid::Number(42));

        display.create_slot(&key, Placement::Slot(0), &decor()).unwrap();
        assert_eq!(display.placement(&key), Some(Placement::Slot(0)));
        assert!(display.render_placeholder_into(&key).is_ok());

        let track: RemoteTrackHandle = MockRemoteTrack::video();
        assert!(display.render_track_into(&key, &track).is_ok());

        display.remove_slot(&key).unwrap();
        assert!(display.is_empty());
    }

    #[test]
    fn test_tracing_display_from_config() {
        let mut display = TracingDisplay::from_config(&ClientConfig::default());
        let key = ContainerKey::remote(&Uid::Number(8));
        display.create_slot(&key, Placement::Overflow, &decor()).unwrap();
        assert_eq!(display.placement(&key), Some(Placement::Overflow));
        assert_eq!(display.placeholder, "/public/img1.jpg");
    }

    #[test]
    fn test_tracing_display_missing_target() {
        let mut display = TracingDisplay::default();
        let key = ContainerKey::remote(&Uid::Number(7));
        assert_eq!(
            display.remove_slot(&key),
            Err(DisplayError::MissingTarget(key.clone()))
        );
        assert!(display
            .set_indicator(&key, Indicator::Mute, true)
            .is_err());
    }

    #[test]
    fn test_tracing_display_rejects_duplicate() {
        let mut display = TracingDisplay::default();
        let key = ContainerKey::screen_share();
        display.create_slot(&key, Placement::Stage, &decor()).unwrap();
        assert!(matches!(
            display.create_slot(&key, Placement::Stage, &decor()),
            Err(DisplayError::Rejected { .. })
        ));
        assert_eq!(display.len(), 1);
    }

    #[test]
    fn test_recording_display_shares_log_between_clones() {
        let display = mock::RecordingDisplay::new();
        let mut moved = display.clone();
        let key = ContainerKey::remote(&Uid::Number(1));
        moved.create_slot(&key, Placement::Overflow, &decor()).unwrap();
        assert!(display.is_live(&key));
        assert_eq!(display.create_count(&key), 1);
    }

    #[test]
    fn test_recording_display_injected_failure() {
        let display = mock::RecordingDisplay::new();
        let mut moved = display.clone();
        let key = ContainerKey::remote(&Uid::Number(3));
        display.fail_for(key.clone());
        assert!(moved.create_slot(&key, Placement::Slot(0), &decor()).is_err());
        assert!(!display.is_live(&key));
        assert_eq!(display.calls().len(), 1);
    }
}
