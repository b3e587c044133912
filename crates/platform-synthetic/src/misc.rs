//! Synthetic preview surface and level meter.

use std::sync::atomic::{AtomicU64, Ordering};

use castline_common::error::CastlineResult;
use castline_platform_core::{MediaStream, MediaTrack, PreviewSurface, SoundLevelMeter};
use parking_lot::Mutex;

/// Remembers the track ids of every attach.
#[derive(Default)]
pub struct SyntheticPreview {
    history: Mutex<Vec<Option<Vec<String>>>>,
}

impl SyntheticPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track ids currently shown, `None` if cleared or never attached.
    pub fn current(&self) -> Option<Vec<String>> {
        self.history.lock().last().cloned().flatten()
    }

    pub fn attach_count(&self) -> usize {
        self.history.lock().len()
    }
}

impl PreviewSurface for SyntheticPreview {
    fn attach(&self, stream: Option<&MediaStream>) {
        let ids = stream.map(|s| s.tracks().iter().map(|t| t.id().to_string()).collect());
        self.history.lock().push(ids);
    }
}

/// Level meter whose input level is set by the test.
///
/// Reads 0 unless a connected track is live and enabled, the way a real
/// meter hears silence from a disabled track.
#[derive(Default)]
pub struct SyntheticMeter {
    level_bits: AtomicU64,
    connected: Mutex<Option<MediaStream>>,
}

impl SyntheticMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&self, level: f64) {
        self.level_bits.store(level.to_bits(), Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.lock().is_some()
    }

    /// Ids of the tracks the meter listens to.
    pub fn connected_track_ids(&self) -> Vec<String> {
        self.connected
            .lock()
            .as_ref()
            .map(|s| s.tracks().iter().map(|t| t.id().to_string()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SoundLevelMeter for SyntheticMeter {
    async fn connect(&self, stream: &MediaStream) -> CastlineResult<()> {
        *self.connected.lock() = Some(stream.clone());
        Ok(())
    }

    fn instant(&self) -> f64 {
        let audible = self.connected.lock().as_ref().is_some_and(|s| {
            s.audio_tracks().any(|t| t.is_live() && t.is_enabled())
        });
        if audible {
            f64::from_bits(self.level_bits.load(Ordering::SeqCst))
        } else {
            0.0
        }
    }

    fn disconnect(&self) {
        *self.connected.lock() = None;
    }
}
