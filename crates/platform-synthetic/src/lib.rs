//! Castline synthetic platform.
//!
//! An in-memory host that implements every platform contract without real
//! devices. Each piece records what the engine asked of it, so tests and
//! the `castline simulate` command can observe acquisitions, sender
//! replacements, canvas draws, and track stops.

pub mod audio;
pub mod devices;
pub mod misc;
pub mod render;
pub mod sender;
pub mod track;

use std::sync::Arc;

use castline_platform_core::Platform;

pub use audio::{SyntheticAudio, SyntheticGain};
pub use devices::{AcquireCall, Failure, SyntheticDevices};
pub use misc::{SyntheticMeter, SyntheticPreview};
pub use render::{DrawOp, SyntheticCanvas, SyntheticRender, SyntheticSink};
pub use sender::{SyntheticSender, SyntheticSenderRegistry};
pub use track::SyntheticTrack;

/// Concrete handles to every synthetic component.
#[derive(Clone)]
pub struct SyntheticPlatform {
    pub devices: Arc<SyntheticDevices>,
    pub senders: Arc<SyntheticSenderRegistry>,
    pub audio: Arc<SyntheticAudio>,
    pub render: Arc<SyntheticRender>,
    pub preview: Arc<SyntheticPreview>,
    pub meter: Arc<SyntheticMeter>,
}

impl Default for SyntheticPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticPlatform {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(SyntheticDevices::new()),
            senders: Arc::new(SyntheticSenderRegistry::new()),
            audio: Arc::new(SyntheticAudio::new()),
            render: Arc::new(SyntheticRender::new()),
            preview: Arc::new(SyntheticPreview::new()),
            meter: Arc::new(SyntheticMeter::new()),
        }
    }

    /// Type-erased view for the engine.
    pub fn platform(&self) -> Platform {
        Platform {
            devices: self.devices.clone(),
            senders: self.senders.clone(),
            audio: self.audio.clone(),
            render: self.render.clone(),
            preview: self.preview.clone(),
            meter: Some(self.meter.clone()),
        }
    }
}
