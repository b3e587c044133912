//! Synthetic audio graphs.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::{TrackKind, TrackSource};
use castline_platform_core::{AudioContext, AudioGraphFactory, GainNode, MediaTrack, TrackHandle};
use parking_lot::Mutex;

use crate::track::SyntheticTrack;

#[derive(Debug)]
pub struct SyntheticGain {
    input_track: String,
    value: AtomicU32,
}

impl SyntheticGain {
    /// Id of the track feeding this node.
    pub fn input_track(&self) -> &str {
        &self.input_track
    }
}

impl GainNode for SyntheticGain {
    fn gain(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::SeqCst))
    }

    fn set_gain(&self, value: f32) {
        self.value.store(value.to_bits(), Ordering::SeqCst);
    }
}

pub struct SyntheticAudioContext {
    closed: Arc<AtomicBool>,
}

impl AudioContext for SyntheticAudioContext {
    fn create_branch(&self, track: &TrackHandle, gain: f32) -> CastlineResult<Arc<dyn GainNode>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CastlineError::acquisition("audio context is closed"));
        }
        if track.kind() != TrackKind::Audio {
            return Err(CastlineError::acquisition("gain branch needs an audio track"));
        }
        let node = Arc::new(SyntheticGain {
            input_track: track.id().to_string(),
            value: AtomicU32::new(gain.to_bits()),
        });
        Ok(node)
    }

    fn create_output(&self, branches: &[Arc<dyn GainNode>]) -> CastlineResult<TrackHandle> {
        if branches.is_empty() {
            return Err(CastlineError::acquisition("no branches to merge"));
        }
        Ok(SyntheticTrack::audio(TrackSource::Synthetic, None).handle())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out contexts and keeps their close flags for inspection.
#[derive(Default)]
pub struct SyntheticAudio {
    created: AtomicUsize,
    contexts: Mutex<Vec<Arc<AtomicBool>>>,
}

impl SyntheticAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Contexts created and not yet closed.
    pub fn open_contexts(&self) -> usize {
        self.contexts
            .lock()
            .iter()
            .filter(|closed| !closed.load(Ordering::SeqCst))
            .count()
    }
}

impl AudioGraphFactory for SyntheticAudio {
    fn create_context(&self) -> CastlineResult<Box<dyn AudioContext>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::new(AtomicBool::new(false));
        self.contexts.lock().push(closed.clone());
        Ok(Box::new(SyntheticAudioContext { closed }))
    }
}
