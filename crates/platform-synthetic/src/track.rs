//! Synthetic media tracks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::{FacingMode, TrackKind, TrackSource, VideoConstraint};
use castline_platform_core::{MediaTrack, TrackHandle, TrackSettings};
use parking_lot::Mutex;

/// A track with no media behind it. Records every state change.
#[derive(Debug)]
pub struct SyntheticTrack {
    id: String,
    kind: TrackKind,
    source: TrackSource,
    enabled: AtomicBool,
    live: AtomicBool,
    settings: Mutex<TrackSettings>,
    applied: Mutex<Vec<VideoConstraint>>,
    reject_constraints: AtomicBool,
}

impl SyntheticTrack {
    pub fn new(kind: TrackKind, source: TrackSource, settings: TrackSettings) -> Arc<Self> {
        Arc::new(Self {
            id: format!("{}-{}", kind, uuid::Uuid::new_v4()),
            kind,
            source,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            settings: Mutex::new(settings),
            applied: Mutex::new(Vec::new()),
            reject_constraints: AtomicBool::new(false),
        })
    }

    pub fn audio(source: TrackSource, device_id: Option<String>) -> Arc<Self> {
        Self::new(
            TrackKind::Audio,
            source,
            TrackSettings {
                device_id,
                ..TrackSettings::default()
            },
        )
    }

    pub fn video(
        source: TrackSource,
        device_id: Option<String>,
        width: u32,
        height: u32,
        facing_mode: Option<FacingMode>,
    ) -> Arc<Self> {
        Self::new(
            TrackKind::Video,
            source,
            TrackSettings {
                device_id,
                width: Some(width),
                height: Some(height),
                facing_mode,
            },
        )
    }

    pub fn handle(self: &Arc<Self>) -> TrackHandle {
        self.clone()
    }

    /// Simulate the shared window or camera changing resolution.
    pub fn set_resolution(&self, width: u32, height: u32) {
        let mut settings = self.settings.lock();
        settings.width = Some(width);
        settings.height = Some(height);
    }

    /// Constraints applied live via `apply_constraints`.
    pub fn applied_constraints(&self) -> Vec<VideoConstraint> {
        self.applied.lock().clone()
    }

    pub fn reject_constraints(&self, reject: bool) {
        self.reject_constraints.store(reject, Ordering::SeqCst);
    }

    /// The platform ending the track on its own (e.g. "stop sharing").
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn source(&self) -> TrackSource {
        self.source
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::trace!(track = %self.id, "Synthetic track stopped");
        }
    }

    fn settings(&self) -> TrackSettings {
        self.settings.lock().clone()
    }

    async fn apply_constraints(&self, constraint: &VideoConstraint) -> CastlineResult<()> {
        if !self.is_live() {
            return Err(CastlineError::acquisition(format!(
                "track {} has ended",
                self.id
            )));
        }
        if self.reject_constraints.load(Ordering::SeqCst) {
            return Err(CastlineError::acquisition("constraint not satisfiable"));
        }
        if let VideoConstraint::Facing { mode } = constraint {
            self.settings.lock().facing_mode = Some(*mode);
        }
        self.applied.lock().push(constraint.clone());
        Ok(())
    }
}
