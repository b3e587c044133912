//! Audio processing graph primitives.

use std::fmt;
use std::sync::Arc;

use castline_common::error::CastlineResult;

use crate::track::TrackHandle;

/// A volume control node in an audio graph.
pub trait GainNode: Send + Sync + fmt::Debug {
    fn gain(&self) -> f32;
    fn set_gain(&self, value: f32);
}

/// One processing context. Nodes created by a context die with it.
pub trait AudioContext: Send + Sync {
    /// Route `track` through a new gain node set to `gain`.
    fn create_branch(&self, track: &TrackHandle, gain: f32) -> CastlineResult<Arc<dyn GainNode>>;

    /// Merge `branches` into one destination and return its output track.
    fn create_output(&self, branches: &[Arc<dyn GainNode>]) -> CastlineResult<TrackHandle>;

    /// Release the context and every node it created.
    fn close(&self);
}

pub trait AudioGraphFactory: Send + Sync {
    fn create_context(&self) -> CastlineResult<Box<dyn AudioContext>>;
}
