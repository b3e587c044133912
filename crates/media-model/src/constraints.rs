//! Capture constraints.
//!
//! Each constraint is decided once as a tagged variant and matched
//! exhaustively by the acquisition layer.

use serde::{Deserialize, Serialize};

use crate::mode::AudioMode;
use crate::track::FacingMode;

/// Video acquisition selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoConstraint {
    Disabled,
    #[default]
    AnyDevice,
    SpecificDevice { id: String },
    Facing { mode: FacingMode },
}

impl VideoConstraint {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, VideoConstraint::Disabled)
    }
}

/// Audio acquisition selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioConstraint {
    Disabled,
    #[default]
    AnyDevice,
    SpecificDevice { id: String },
}

impl AudioConstraint {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AudioConstraint::Disabled)
    }
}

/// The desired configuration for user-device acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CaptureConstraints {
    pub video: VideoConstraint,
    pub audio: AudioConstraint,
}

impl CaptureConstraints {
    /// `{video: true, audio: true}`.
    pub fn any() -> Self {
        Self {
            video: VideoConstraint::AnyDevice,
            audio: AudioConstraint::AnyDevice,
        }
    }

    /// Derive the set actually requested from user devices under `mode`.
    ///
    /// In `System` mode the only audio origin is the display capture, so the
    /// microphone is forced off.
    pub fn effective(&self, mode: AudioMode) -> Self {
        let audio = if mode.uses_microphone() {
            self.audio.clone()
        } else {
            AudioConstraint::Disabled
        };
        Self {
            video: self.video.clone(),
            audio,
        }
    }

    pub fn video_only(&self) -> Self {
        Self {
            video: self.video.clone(),
            audio: AudioConstraint::Disabled,
        }
    }

    pub fn audio_only(&self) -> Self {
        Self {
            video: VideoConstraint::Disabled,
            audio: self.audio.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.video.is_enabled() && !self.audio.is_enabled()
    }
}

/// Constraints for display (screen/window) capture. Video is always requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisplayConstraints {
    /// Request the system audio carried by the shared surface.
    pub audio: bool,
}

impl DisplayConstraints {
    pub fn for_mode(mode: AudioMode) -> Self {
        Self {
            audio: mode.uses_system_audio(),
        }
    }
}
