//! Immutable stream configuration.
//!
//! Built once (from defaults, a config file, or CLI flags) and handed to
//! each engine component at construction. Components copy out the fields
//! they need; nothing writes back to it.

use std::time::Duration;

use castline_common::error::{CastlineError, CastlineResult};
use serde::{Deserialize, Serialize};

use crate::constraints::{AudioConstraint, CaptureConstraints, VideoConstraint};
use crate::mode::{AudioMode, PublishMode};

/// Outbound video bitrate cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    #[default]
    Unlimited,
    Kbps(u32),
}

impl Bandwidth {
    /// Value for an encoding's max-bitrate field. `None` clears the field.
    pub fn max_bitrate_bps(&self) -> Option<u64> {
        match self {
            Bandwidth::Unlimited => None,
            Bandwidth::Kbps(kbps) => Some(u64::from(*kbps) * 1000),
        }
    }
}

/// Vertical anchor for the camera overlay. The overlay is always right-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraLocation {
    Top,
    #[default]
    Bottom,
}

/// Solid-colour frame sent while the camera is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankFrame {
    pub width: u32,
    pub height: u32,
    pub color: [u8; 3],
}

impl Default for BlankFrame {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            color: [0, 0, 0],
        }
    }
}

/// Every recognized option of the stream engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Initial outbound bitrate cap.
    pub bandwidth: Bandwidth,

    /// Camera overlay margin from the canvas edges, in pixels.
    pub camera_margin: u32,

    pub camera_location: CameraLocation,

    /// Camera overlay width as a percentage of the screen width.
    pub camera_percent: f64,

    /// Publish mode used by the first acquisition.
    pub publish_mode: PublishMode,

    /// Audio mode used by the first acquisition.
    pub audio_mode: AudioMode,

    /// Initial video selector for user-device capture.
    pub video: VideoConstraint,

    /// Initial audio selector for user-device capture.
    pub audio: AudioConstraint,

    /// Compositor redraw rate in frames per second.
    pub composite_fps: u32,

    /// Blank-frame refresh interval while the camera is disabled.
    pub keepalive_interval_ms: u64,

    pub blank_frame: BlankFrame,

    /// Sound level in `[0, 1]` above which a muted user counts as speaking.
    pub speaking_threshold: f64,

    /// How often the level meter is sampled while muted.
    pub speaking_poll_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bandwidth: Bandwidth::Unlimited,
            camera_margin: 15,
            camera_location: CameraLocation::Bottom,
            camera_percent: 15.0,
            publish_mode: PublishMode::Camera,
            audio_mode: AudioMode::Microphone,
            video: VideoConstraint::AnyDevice,
            audio: AudioConstraint::AnyDevice,
            composite_fps: 15,
            keepalive_interval_ms: 3000,
            blank_frame: BlankFrame::default(),
            speaking_threshold: 0.05,
            speaking_poll_ms: 500,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> CastlineResult<()> {
        if !(self.camera_percent > 0.0 && self.camera_percent <= 100.0) {
            return Err(CastlineError::config(format!(
                "camera_percent must be in (0, 100], got {}",
                self.camera_percent
            )));
        }
        if self.composite_fps == 0 {
            return Err(CastlineError::config("composite_fps must be positive"));
        }
        if self.keepalive_interval_ms == 0 || self.speaking_poll_ms == 0 {
            return Err(CastlineError::config("intervals must be positive"));
        }
        if !(0.0..=1.0).contains(&self.speaking_threshold) {
            return Err(CastlineError::config(format!(
                "speaking_threshold must be in [0, 1], got {}",
                self.speaking_threshold
            )));
        }
        if self.blank_frame.width == 0 || self.blank_frame.height == 0 {
            return Err(CastlineError::config("blank frame must have a non-zero size"));
        }
        Ok(())
    }

    /// Constraint set for the first acquisition.
    pub fn initial_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            video: self.video.clone(),
            audio: self.audio.clone(),
        }
    }

    pub fn composite_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.composite_fps.max(1)))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn speaking_poll_interval(&self) -> Duration {
        Duration::from_millis(self.speaking_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        config.validate().unwrap();
        assert_eq!(config.composite_interval(), Duration::from_millis(66));
        assert_eq!(config.keepalive_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn rejects_out_of_range_percent() {
        let config = StreamConfig {
            camera_percent: 120.0,
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: StreamConfig = serde_json::from_str(
            r#"{"publish_mode":"screen+camera","camera_location":"top","bandwidth":{"kbps":500}}"#,
        )
        .unwrap();
        assert_eq!(config.publish_mode, PublishMode::ScreenAndCamera);
        assert_eq!(config.camera_location, CameraLocation::Top);
        assert_eq!(config.bandwidth, Bandwidth::Kbps(500));
        assert_eq!(config.composite_fps, 15);
    }

    #[test]
    fn unlimited_clears_bitrate() {
        assert_eq!(Bandwidth::Unlimited.max_bitrate_bps(), None);
        assert_eq!(Bandwidth::Kbps(256).max_bitrate_bps(), Some(256_000));
    }
}
