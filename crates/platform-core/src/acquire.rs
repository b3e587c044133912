//! Raw and display media acquisition.

use castline_common::error::CastlineResult;
use castline_media_model::{CaptureConstraints, DeviceInfo, DisplayConstraints};

use crate::track::MediaStream;

/// Host media capture.
///
/// Failures use the shared error type: a missing device is
/// `DeviceNotFound`, a refused prompt is `PermissionDenied`, anything else
/// is `Acquisition`.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire camera and/or microphone tracks.
    async fn acquire(&self, constraints: &CaptureConstraints) -> CastlineResult<MediaStream>;

    /// Acquire a screen, window, or tab. Prompts the user on most hosts.
    async fn acquire_display(&self, constraints: &DisplayConstraints)
        -> CastlineResult<MediaStream>;

    async fn enumerate_devices(&self) -> CastlineResult<Vec<DeviceInfo>>;

    fn supports_capture(&self) -> bool;

    fn supports_display_capture(&self) -> bool;
}

/// A host capability the engine may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
}

/// Check what the host offers.
pub fn capability_report(devices: &dyn MediaDevices) -> Vec<Capability> {
    vec![
        Capability {
            name: "Media Capture".to_string(),
            description: "Camera and microphone acquisition".to_string(),
            available: devices.supports_capture(),
            required: true,
        },
        Capability {
            name: "Display Capture".to_string(),
            description: "Screen and window sharing for screen publish modes".to_string(),
            available: devices.supports_display_capture(),
            required: false,
        },
    ]
}
