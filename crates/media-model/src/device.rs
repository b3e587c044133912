//! Capture device descriptors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    AudioInput,
    VideoInput,
    AudioOutput,
}

/// One entry of the available-devices snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub kind: DeviceKind,
    pub label: String,
}

/// Whether a snapshot still has at least one device of each capture kind.
pub fn missing_capture_kinds(devices: &[DeviceInfo]) -> Vec<DeviceKind> {
    [DeviceKind::AudioInput, DeviceKind::VideoInput]
        .into_iter()
        .filter(|kind| !devices.iter().any(|d| d.kind == *kind))
        .collect()
}
