//! Publish and audio topologies.

use serde::{Deserialize, Serialize};

/// Which capture source topology feeds the outgoing video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    #[default]
    Camera,
    Screen,
    /// Screen with a camera overlay, composited locally.
    #[serde(rename = "screen+camera")]
    ScreenAndCamera,
}

impl PublishMode {
    /// Whether acquisition goes through display capture.
    pub fn uses_display(&self) -> bool {
        !matches!(self, PublishMode::Camera)
    }

    pub fn uses_compositor(&self) -> bool {
        matches!(self, PublishMode::ScreenAndCamera)
    }
}

/// Which audio origins are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    Microphone,
    System,
    /// System audio and microphone mixed into one track.
    #[serde(rename = "system+microphone")]
    SystemAndMicrophone,
}

impl AudioMode {
    pub fn uses_microphone(&self) -> bool {
        !matches!(self, AudioMode::System)
    }

    pub fn uses_system_audio(&self) -> bool {
        !matches!(self, AudioMode::Microphone)
    }

    pub fn mixes(&self) -> bool {
        matches!(self, AudioMode::SystemAndMicrophone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_wire_values() {
        assert_eq!(
            serde_json::to_string(&PublishMode::ScreenAndCamera).unwrap(),
            "\"screen+camera\""
        );
        assert_eq!(
            serde_json::from_str::<AudioMode>("\"system+microphone\"").unwrap(),
            AudioMode::SystemAndMicrophone
        );
    }

    #[test]
    fn topology_predicates() {
        assert!(!PublishMode::Camera.uses_display());
        assert!(PublishMode::Screen.uses_display());
        assert!(PublishMode::ScreenAndCamera.uses_compositor());
        assert!(AudioMode::Microphone.uses_microphone());
        assert!(!AudioMode::System.uses_microphone());
        assert!(AudioMode::SystemAndMicrophone.mixes());
    }
}
