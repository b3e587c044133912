//! Castline platform core contracts.
//!
//! Every capability the stream engine consumes from its host is a trait in
//! this crate: device and display acquisition, the transport session's
//! track senders, audio processing graphs, offscreen render surfaces, the
//! local preview, and the sound level meter. Concrete hosts implement them;
//! `castline-platform-synthetic` provides an in-memory implementation.

pub mod acquire;
pub mod audio;
pub mod meter;
pub mod preview;
pub mod render;
pub mod sender;
pub mod track;

use std::sync::Arc;

pub use acquire::{capability_report, Capability, MediaDevices};
pub use audio::{AudioContext, AudioGraphFactory, GainNode};
pub use meter::SoundLevelMeter;
pub use preview::PreviewSurface;
pub use render::{Canvas, Rect, RenderBackend, Rgb, VideoSink};
pub use sender::{EncodingParameters, SendParameters, TrackSender, TrackSenderRegistry};
pub use track::{same_track, MediaStream, MediaTrack, TrackHandle, TrackSettings};

/// The full set of host capabilities handed to the engine.
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub senders: Arc<dyn TrackSenderRegistry>,
    pub audio: Arc<dyn AudioGraphFactory>,
    pub render: Arc<dyn RenderBackend>,
    pub preview: Arc<dyn PreviewSurface>,
    /// Optional; without it speaking-while-muted detection is off.
    pub meter: Option<Arc<dyn SoundLevelMeter>>,
}
