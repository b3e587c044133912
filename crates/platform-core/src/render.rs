//! Offscreen rendering surfaces for compositing and blank frames.

use std::fmt;
use std::sync::Arc;

use castline_common::error::CastlineResult;

use crate::track::{MediaStream, TrackHandle};

pub type Rgb = [u8; 3];

/// Destination rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, f64::from(width), f64::from(height))
    }
}

/// An offscreen player bound to a stream; exposes its latest frame.
pub trait VideoSink: Send + Sync + fmt::Debug {
    /// Intrinsic width of the current frame, 0 before the first frame.
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Stop playback and detach from the stream.
    fn stop(&self);
}

/// A 2D drawing surface whose contents can be captured as a video track.
pub trait Canvas: Send + Sync + fmt::Debug {
    fn size(&self) -> (u32, u32);
    fn resize(&self, width: u32, height: u32);
    fn draw(&self, sink: &dyn VideoSink, dest: Rect);
    fn fill(&self, color: Rgb, dest: Rect);
    /// Capture the canvas as a live video track at `fps`.
    fn capture(&self, fps: u32) -> CastlineResult<TrackHandle>;
}

pub trait RenderBackend: Send + Sync {
    fn create_canvas(&self, width: u32, height: u32) -> CastlineResult<Arc<dyn Canvas>>;
    fn create_sink(&self, stream: &MediaStream) -> CastlineResult<Arc<dyn VideoSink>>;
}
