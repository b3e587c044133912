//! Stream state management.
//!
//! The [`StreamStateManager`] owns the local stream and the active
//! capture/publish configuration. Every other component reads and mutates
//! through it.

use std::sync::Arc;

use castline_media_model::{AudioMode, CaptureConstraints, PublishMode, TrackKind};
use castline_platform_core::{same_track, MediaStream, PreviewSurface, TrackHandle};

/// At most one audio and one video track, bound to preview and transport.
#[derive(Debug, Clone, Default)]
pub struct LocalStream {
    audio: Option<TrackHandle>,
    video: Option<TrackHandle>,
}

impl LocalStream {
    pub fn new(audio: Option<TrackHandle>, video: Option<TrackHandle>) -> Self {
        Self { audio, video }
    }

    /// Take the first track of each kind from an acquired stream.
    pub fn from_media(stream: &MediaStream) -> Self {
        Self {
            audio: stream.first_audio(),
            video: stream.first_video(),
        }
    }

    pub fn audio(&self) -> Option<&TrackHandle> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&TrackHandle> {
        self.video.as_ref()
    }

    pub fn track(&self, kind: TrackKind) -> Option<&TrackHandle> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    /// Put `track` in the slot for its kind, returning the previous occupant.
    fn set(&mut self, kind: TrackKind, track: Option<TrackHandle>) -> Option<TrackHandle> {
        match kind {
            TrackKind::Audio => std::mem::replace(&mut self.audio, track),
            TrackKind::Video => std::mem::replace(&mut self.video, track),
        }
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.audio.iter().chain(self.video.iter())
    }

    pub fn contains(&self, track: &TrackHandle) -> bool {
        self.tracks().any(|t| same_track(t, track))
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    pub fn to_media_stream(&self) -> MediaStream {
        MediaStream::new(self.tracks().cloned().collect())
    }
}

pub struct StreamStateManager {
    preview: Arc<dyn PreviewSurface>,
    stream: Option<LocalStream>,
    session_id: Option<String>,
    constraints: CaptureConstraints,
    publish_mode: PublishMode,
    audio_mode: AudioMode,
    /// The screen capture currently in use, if any.
    display_source: Option<MediaStream>,
    /// Displaced tracks awaiting stop once nothing binds them.
    pending_disposal: Vec<TrackHandle>,
}

impl StreamStateManager {
    pub fn new(
        preview: Arc<dyn PreviewSurface>,
        constraints: CaptureConstraints,
        publish_mode: PublishMode,
        audio_mode: AudioMode,
    ) -> Self {
        Self {
            preview,
            stream: None,
            session_id: None,
            constraints,
            publish_mode,
            audio_mode,
            display_source: None,
            pending_disposal: Vec::new(),
        }
    }

    pub fn stream(&self) -> Option<&LocalStream> {
        self.stream.as_ref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.as_ref().map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn track(&self, kind: TrackKind) -> Option<TrackHandle> {
        self.stream.as_ref().and_then(|s| s.track(kind)).cloned()
    }

    /// Replace the local stream and rebind the preview.
    ///
    /// Tracks of the old stream that the new one does not carry are
    /// scheduled for disposal rather than stopped here.
    pub fn set_stream(&mut self, stream: LocalStream) {
        if let Some(old) = self.stream.take() {
            for track in old.tracks() {
                if !stream.contains(track) {
                    self.schedule_disposal(track.clone());
                }
            }
        }
        tracing::debug!(
            audio = stream.audio().map(|t| t.id()),
            video = stream.video().map(|t| t.id()),
            "Local stream set"
        );
        self.stream = Some(stream);
        self.rebind_preview();
    }

    /// Swap one track of the local stream in place.
    ///
    /// Creates the stream if none exists. The previous track, if different,
    /// is scheduled for disposal and returned.
    pub fn swap_track(&mut self, kind: TrackKind, track: Option<TrackHandle>) -> Option<TrackHandle> {
        let stream = self.stream.get_or_insert_with(LocalStream::default);
        let previous = stream.set(kind, track.clone());
        let changed = match (&previous, &track) {
            (Some(old), Some(new)) => !same_track(old, new),
            (Some(_), None) => true,
            _ => false,
        };
        if changed {
            if let Some(old) = &previous {
                self.schedule_disposal(old.clone());
            }
        }
        self.rebind_preview();
        previous.filter(|_| changed)
    }

    pub fn schedule_disposal(&mut self, track: TrackHandle) {
        if !self.pending_disposal.iter().any(|t| same_track(t, &track)) {
            self.pending_disposal.push(track);
        }
    }

    /// Stop every scheduled track that is no longer bound to the local
    /// stream. Returns how many were stopped.
    pub fn dispose_unbound(&mut self) -> usize {
        let bound = self.stream.clone().unwrap_or_default();
        let (keep, dispose): (Vec<_>, Vec<_>) = self
            .pending_disposal
            .drain(..)
            .partition(|t| bound.contains(t));
        for track in &dispose {
            track.stop();
        }
        self.pending_disposal = keep;
        if !dispose.is_empty() {
            tracing::debug!(count = dispose.len(), "Released displaced tracks");
        }
        dispose.len()
    }

    pub fn pending_disposal(&self) -> usize {
        self.pending_disposal.len()
    }

    /// Stop every track held, clear state, and clear the preview.
    pub fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            for track in stream.tracks() {
                track.stop();
            }
        }
        for track in self.pending_disposal.drain(..) {
            track.stop();
        }
        if let Some(display) = self.display_source.take() {
            display.stop_all();
        }
        self.preview.attach(None);
        tracing::info!("Local stream closed");
    }

    fn rebind_preview(&self) {
        let media = self.stream.as_ref().map(|s| s.to_media_stream());
        self.preview.attach(media.as_ref());
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
    }

    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut CaptureConstraints {
        &mut self.constraints
    }

    pub fn publish_mode(&self) -> PublishMode {
        self.publish_mode
    }

    pub fn set_publish_mode(&mut self, mode: PublishMode) {
        self.publish_mode = mode;
    }

    pub fn audio_mode(&self) -> AudioMode {
        self.audio_mode
    }

    pub fn set_audio_mode(&mut self, mode: AudioMode) {
        self.audio_mode = mode;
    }

    pub fn display_source(&self) -> Option<&MediaStream> {
        self.display_source.as_ref()
    }

    pub fn set_display_source(&mut self, source: Option<MediaStream>) {
        self.display_source = source;
    }

    /// Stop the video of the active screen capture and forget it.
    ///
    /// Display audio is left alone; it may still be bound or mixed until the
    /// audio path replaces it.
    pub fn stop_display_video(&mut self) {
        if let Some(display) = self.display_source.take() {
            for track in display.video_tracks() {
                track.stop();
            }
            let remaining: Vec<_> = display
                .audio_tracks()
                .filter(|t| t.is_live())
                .cloned()
                .collect();
            for track in remaining {
                self.schedule_disposal(track);
            }
            tracing::info!("Screen capture source stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use castline_media_model::TrackSource;
    use castline_platform_synthetic::{SyntheticPreview, SyntheticTrack};

    use super::*;

    fn manager() -> (StreamStateManager, Arc<SyntheticPreview>) {
        let preview = Arc::new(SyntheticPreview::new());
        let state = StreamStateManager::new(
            preview.clone(),
            CaptureConstraints::any(),
            PublishMode::Camera,
            AudioMode::Microphone,
        );
        (state, preview)
    }

    #[test]
    fn set_stream_rebinds_preview() {
        let (mut state, preview) = manager();
        let audio = SyntheticTrack::audio(TrackSource::Device, None).handle();
        state.set_stream(LocalStream::new(Some(audio.clone()), None));

        assert_eq!(preview.current(), Some(vec![audio.id().to_string()]));
        assert!(state.has_stream());
    }

    #[test]
    fn swap_schedules_previous_without_stopping_it() {
        let (mut state, _) = manager();
        let first = SyntheticTrack::audio(TrackSource::Device, None).handle();
        let second = SyntheticTrack::audio(TrackSource::Device, None).handle();
        state.set_stream(LocalStream::new(Some(first.clone()), None));

        let previous = state.swap_track(TrackKind::Audio, Some(second.clone()));
        assert_eq!(previous.unwrap().id(), first.id());
        assert!(first.is_live());
        assert_eq!(state.pending_disposal(), 1);

        assert_eq!(state.dispose_unbound(), 1);
        assert!(!first.is_live());
        assert!(second.is_live());
    }

    #[test]
    fn swapping_same_track_is_not_a_change() {
        let (mut state, _) = manager();
        let track = SyntheticTrack::audio(TrackSource::Device, None).handle();
        state.swap_track(TrackKind::Audio, Some(track.clone()));
        assert!(state.swap_track(TrackKind::Audio, Some(track.clone())).is_none());
        assert_eq!(state.pending_disposal(), 0);
    }

    #[test]
    fn close_stops_everything_held() {
        let (mut state, preview) = manager();
        let audio = SyntheticTrack::audio(TrackSource::Device, None).handle();
        let video = SyntheticTrack::video(TrackSource::Device, None, 640, 480, None).handle();
        let side = SyntheticTrack::audio(TrackSource::Device, None).handle();
        let screen = SyntheticTrack::video(TrackSource::Display, None, 1280, 720, None).handle();

        state.set_stream(LocalStream::new(Some(audio.clone()), Some(video.clone())));
        state.schedule_disposal(side.clone());
        state.set_display_source(Some(MediaStream::new(vec![screen.clone()])));

        state.close_stream();
        for track in [&audio, &video, &side, &screen] {
            assert!(!track.is_live(), "{} still live", track.id());
        }
        assert!(state.stream().is_none());
        assert_eq!(preview.current(), None);
    }

    #[test]
    fn stop_display_video_defers_audio() {
        let (mut state, _) = manager();
        let screen = SyntheticTrack::video(TrackSource::Display, None, 1280, 720, None).handle();
        let system = SyntheticTrack::audio(TrackSource::Display, None).handle();
        state.set_display_source(Some(MediaStream::new(vec![screen.clone(), system.clone()])));
        state.swap_track(TrackKind::Audio, Some(system.clone()));

        state.stop_display_video();
        assert!(!screen.is_live());
        assert!(system.is_live());
        // Still bound, so disposal keeps it.
        assert_eq!(state.dispose_unbound(), 0);
        assert!(state.display_source().is_none());
    }
}
