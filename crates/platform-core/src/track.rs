//! Media tracks and the streams that bundle them.

use std::fmt;
use std::sync::Arc;

use castline_common::error::CastlineResult;
use castline_media_model::{FacingMode, TrackKind, TrackSource, VideoConstraint};

/// One live audio or video track owned by the host.
///
/// Handles are shared; `stop()` ends the track for every holder.
#[async_trait::async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    /// Stable identifier, unique per acquisition.
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn source(&self) -> TrackSource;

    /// Whether the track emits media. A disabled track stays bound and
    /// emits silence or black.
    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// `false` once stopped or ended by the platform.
    fn is_live(&self) -> bool;

    /// Stop the track and release its device. Idempotent.
    fn stop(&self);

    fn settings(&self) -> TrackSettings;

    /// Apply a constraint to the running track without reacquiring it.
    async fn apply_constraints(&self, constraint: &VideoConstraint) -> CastlineResult<()>;
}

/// Shared handle to a host track.
pub type TrackHandle = Arc<dyn MediaTrack>;

/// Current settings reported by a track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSettings {
    pub device_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub facing_mode: Option<FacingMode>,
}

pub fn same_track(a: &TrackHandle, b: &TrackHandle) -> bool {
    a.id() == b.id()
}

/// An acquired bundle of tracks, as returned by capture calls.
///
/// Unlike the engine's local stream this may hold several tracks of one
/// kind (e.g. a display capture carrying video and system audio, merged
/// with a separately acquired microphone).
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<TrackHandle>,
}

impl MediaStream {
    pub fn new(tracks: Vec<TrackHandle>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    pub fn add_track(&mut self, track: TrackHandle) {
        if !self.tracks.iter().any(|t| same_track(t, &track)) {
            self.tracks.push(track);
        }
    }

    pub fn remove_track(&mut self, id: &str) -> Option<TrackHandle> {
        let index = self.tracks.iter().position(|t| t.id() == id)?;
        Some(self.tracks.remove(index))
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn first_audio(&self) -> Option<TrackHandle> {
        self.audio_tracks().next().cloned()
    }

    pub fn first_video(&self) -> Option<TrackHandle> {
        self.video_tracks().next().cloned()
    }

    pub fn first_of(&self, kind: TrackKind) -> Option<TrackHandle> {
        match kind {
            TrackKind::Audio => self.first_audio(),
            TrackKind::Video => self.first_video(),
        }
    }

    /// Same stream without its audio tracks.
    pub fn without_audio(&self) -> Self {
        Self::new(self.video_tracks().cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| (t.kind(), t.id())))
            .finish()
    }
}
