//! Synthetic canvases and offscreen sinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::TrackSource;
use castline_platform_core::{
    Canvas, MediaStream, MediaTrack, Rect, RenderBackend, Rgb, TrackHandle, VideoSink,
};
use parking_lot::Mutex;

use crate::track::SyntheticTrack;

/// One recorded canvas operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Draw { sink: usize, dest: Rect },
    Fill { color: Rgb, dest: Rect },
}

/// Plays the first video track of a stream; reports that track's size.
#[derive(Debug)]
pub struct SyntheticSink {
    index: usize,
    track: Option<TrackHandle>,
    stopped: AtomicBool,
}

impl SyntheticSink {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl VideoSink for SyntheticSink {
    fn width(&self) -> u32 {
        self.track
            .as_ref()
            .and_then(|t| t.settings().width)
            .unwrap_or(0)
    }

    fn height(&self) -> u32 {
        self.track
            .as_ref()
            .and_then(|t| t.settings().height)
            .unwrap_or(0)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct SyntheticCanvas {
    size: Mutex<(u32, u32)>,
    ops: Mutex<Vec<DrawOp>>,
    captures: Mutex<Vec<Arc<SyntheticTrack>>>,
    sinks: Arc<Mutex<Vec<Arc<SyntheticSink>>>>,
}

impl SyntheticCanvas {
    pub fn ops(&self) -> Vec<DrawOp> {
        self.ops.lock().clone()
    }

    pub fn draw_count(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, DrawOp::Draw { .. }))
            .count()
    }

    pub fn fill_count(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count()
    }

    /// Tracks produced by `capture`.
    pub fn captured_tracks(&self) -> Vec<Arc<SyntheticTrack>> {
        self.captures.lock().clone()
    }

    fn sink_index(&self, sink: &dyn VideoSink) -> usize {
        // Match by identity against the sinks this backend created.
        let target = sink as *const dyn VideoSink as *const ();
        self.sinks
            .lock()
            .iter()
            .find(|s| Arc::as_ptr(s) as *const () == target)
            .map(|s| s.index)
            .unwrap_or(usize::MAX)
    }
}

impl Canvas for SyntheticCanvas {
    fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    fn resize(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }

    fn draw(&self, sink: &dyn VideoSink, dest: Rect) {
        let index = self.sink_index(sink);
        self.ops.lock().push(DrawOp::Draw { sink: index, dest });
    }

    fn fill(&self, color: Rgb, dest: Rect) {
        self.ops.lock().push(DrawOp::Fill { color, dest });
    }

    fn capture(&self, _fps: u32) -> CastlineResult<TrackHandle> {
        let (width, height) = self.size();
        if width == 0 || height == 0 {
            return Err(CastlineError::acquisition("cannot capture an empty canvas"));
        }
        let track = SyntheticTrack::video(TrackSource::Synthetic, None, width, height, None);
        self.captures.lock().push(track.clone());
        Ok(track.handle())
    }
}

/// Creates canvases and sinks, keeping every one for inspection.
#[derive(Default)]
pub struct SyntheticRender {
    canvases: Mutex<Vec<Arc<SyntheticCanvas>>>,
    sinks: Arc<Mutex<Vec<Arc<SyntheticSink>>>>,
}

impl SyntheticRender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canvases(&self) -> Vec<Arc<SyntheticCanvas>> {
        self.canvases.lock().clone()
    }

    pub fn sinks(&self) -> Vec<Arc<SyntheticSink>> {
        self.sinks.lock().clone()
    }
}

impl RenderBackend for SyntheticRender {
    fn create_canvas(&self, width: u32, height: u32) -> CastlineResult<Arc<dyn Canvas>> {
        let canvas = Arc::new(SyntheticCanvas {
            size: Mutex::new((width, height)),
            ops: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
            sinks: self.sinks.clone(),
        });
        self.canvases.lock().push(canvas.clone());
        Ok(canvas)
    }

    fn create_sink(&self, stream: &MediaStream) -> CastlineResult<Arc<dyn VideoSink>> {
        let track = stream.first_video();
        if track.is_none() {
            return Err(CastlineError::acquisition("stream has no video to play"));
        }
        let mut sinks = self.sinks.lock();
        let sink = Arc::new(SyntheticSink {
            index: sinks.len(),
            track,
            stopped: AtomicBool::new(false),
        });
        sinks.push(sink.clone());
        Ok(sink)
    }
}
