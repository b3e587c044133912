//! Asynchronous notifications raised by the stream engine.

use castline_common::error::{CastlineError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Fresh snapshot after a device-change notification.
    DevicesChanged { devices: Vec<DeviceInfo> },

    /// Whether the platform can capture media at all.
    CapabilitySupport { supported: bool },

    /// The shared display surface ended outside our control.
    ScreenShareStopped,

    /// Audio is muted but the level meter reports speech.
    SpeakingWhileMuted,

    Error {
        kind: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl From<&CastlineError> for EngineEvent {
    fn from(error: &CastlineError) -> Self {
        EngineEvent::Error {
            kind: error.kind(),
            message: error.message(),
        }
    }
}
