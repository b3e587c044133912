//! Screen + camera video compositor.
//!
//! Draws the screen source full-size and the camera source as a
//! right-aligned overlay onto one canvas at a fixed rate, and hands the
//! canvas capture out as a single video track. The draw loop is a
//! [`PeriodicTask`] owned by the session; dropping or stopping the session
//! cancels it.

use std::sync::Arc;
use std::time::Duration;

use castline_common::error::{CastlineError, CastlineResult};
use castline_common::PeriodicTask;
use castline_media_model::{CameraLocation, StreamConfig};
use castline_platform_core::{Canvas, MediaStream, Rect, RenderBackend, TrackHandle, VideoSink};
use parking_lot::Mutex;

/// Canvas size used until the screen source reports its first frame.
const FALLBACK_SIZE: (u32, u32) = (1280, 720);

/// Placement of the camera overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub location: CameraLocation,
    /// Distance from the right edge and from the top or bottom edge.
    pub margin: u32,
    /// Overlay width as a percentage of the screen width.
    pub percent: f64,
}

impl OverlayLayout {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            location: config.camera_location,
            margin: config.camera_margin,
            percent: config.camera_percent,
        }
    }
}

/// Where the camera lands on a `screen_width` x `screen_height` canvas.
///
/// The overlay keeps the camera's aspect ratio and is always right-aligned.
pub fn overlay_rect(
    screen_width: u32,
    screen_height: u32,
    camera_width: u32,
    camera_height: u32,
    layout: &OverlayLayout,
) -> Rect {
    let screen_w = f64::from(screen_width);
    let screen_h = f64::from(screen_height);
    let margin = f64::from(layout.margin);

    let width = screen_w * layout.percent / 100.0;
    let height = if camera_width == 0 {
        0.0
    } else {
        width * f64::from(camera_height) / f64::from(camera_width)
    };
    let x = screen_w - width - margin;
    let y = match layout.location {
        CameraLocation::Top => margin,
        CameraLocation::Bottom => screen_h - height - margin,
    };
    Rect::new(x, y, width, height)
}

struct Sources {
    screen: Arc<dyn VideoSink>,
    camera: Arc<dyn VideoSink>,
}

/// Everything one running composite owns.
struct CompositeSession {
    canvas: Arc<dyn Canvas>,
    sources: Arc<Mutex<Sources>>,
    task: PeriodicTask,
    output: TrackHandle,
    camera: MediaStream,
}

impl CompositeSession {
    /// Cancel the draw loop, stop both sinks, the camera, and the output.
    ///
    /// Screen tracks belong to the display source and are left running.
    fn release(mut self) {
        self.task.cancel();
        let sources = self.sources.lock();
        sources.screen.stop();
        sources.camera.stop();
        self.camera.stop_all();
        self.output.stop();
        tracing::debug!(ticks = self.task.ticks(), "Composite session released");
    }
}

fn draw_frame(canvas: &dyn Canvas, sources: &Sources, layout: &OverlayLayout) {
    let (width, height) = (sources.screen.width(), sources.screen.height());
    if width == 0 || height == 0 {
        return;
    }
    if canvas.size() != (width, height) {
        tracing::debug!(width, height, "Screen source resized; resizing canvas");
        canvas.resize(width, height);
    }
    canvas.draw(sources.screen.as_ref(), Rect::full(width, height));

    let (cam_w, cam_h) = (sources.camera.width(), sources.camera.height());
    if cam_w > 0 && cam_h > 0 {
        let dest = overlay_rect(width, height, cam_w, cam_h, layout);
        canvas.draw(sources.camera.as_ref(), dest);
    }
}

pub struct VideoCompositor {
    render: Arc<dyn RenderBackend>,
    layout: OverlayLayout,
    fps: u32,
    interval: Duration,
    session: Option<CompositeSession>,
    retired: Option<CompositeSession>,
    pending: bool,
}

impl VideoCompositor {
    pub fn new(render: Arc<dyn RenderBackend>, config: &StreamConfig) -> Self {
        Self {
            render,
            layout: OverlayLayout::from_config(config),
            fps: config.composite_fps,
            interval: config.composite_interval(),
            session: None,
            retired: None,
            pending: false,
        }
    }

    /// Start compositing `screen` with `camera` and return the output track.
    ///
    /// A session already running is retired, not stopped; see
    /// [`commit`](Self::commit) and [`rollback`](Self::rollback).
    pub fn start_composite(
        &mut self,
        screen: &MediaStream,
        camera: &MediaStream,
    ) -> CastlineResult<TrackHandle> {
        let screen_sink = self.render.create_sink(screen)?;
        let camera_sink = match self.render.create_sink(camera) {
            Ok(sink) => sink,
            Err(e) => {
                screen_sink.stop();
                return Err(e);
            }
        };

        let (width, height) = match (screen_sink.width(), screen_sink.height()) {
            (0, _) | (_, 0) => FALLBACK_SIZE,
            size => size,
        };

        let canvas_output = self
            .render
            .create_canvas(width, height)
            .and_then(|canvas| canvas.capture(self.fps).map(|output| (canvas, output)));
        let (canvas, output) = match canvas_output {
            Ok(parts) => parts,
            Err(e) => {
                screen_sink.stop();
                camera_sink.stop();
                return Err(e);
            }
        };

        let sources = Arc::new(Mutex::new(Sources {
            screen: screen_sink,
            camera: camera_sink,
        }));
        let task = {
            let canvas = canvas.clone();
            let sources = sources.clone();
            let layout = self.layout;
            PeriodicTask::spawn("compositor", self.interval, move || {
                draw_frame(canvas.as_ref(), &sources.lock(), &layout);
            })
        };

        self.retire();
        self.session = Some(CompositeSession {
            canvas,
            sources,
            task,
            output: output.clone(),
            camera: camera.clone(),
        });

        tracing::info!(
            width,
            height,
            fps = self.fps,
            location = ?self.layout.location,
            "Compositor started"
        );
        Ok(output)
    }

    /// Point the running composite at a new camera source.
    ///
    /// The previous camera sink and tracks are stopped once the new sink
    /// is in place.
    pub fn swap_camera(&mut self, camera: &MediaStream) -> CastlineResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CastlineError::no_active_session("compositor is not running"))?;
        let sink = self.render.create_sink(camera)?;
        let old_sink = std::mem::replace(&mut session.sources.lock().camera, sink);
        old_sink.stop();
        let old_camera = std::mem::replace(&mut session.camera, camera.clone());
        old_camera.stop_all();
        tracing::info!("Compositor camera source swapped");
        Ok(())
    }

    /// Move the running session aside until commit or rollback.
    pub fn retire(&mut self) {
        self.pending = true;
        let Some(current) = self.session.take() else {
            return;
        };
        if let Some(older) = self.retired.replace(current) {
            older.release();
        }
    }

    /// Release the retired session.
    pub fn commit(&mut self) {
        self.pending = false;
        if let Some(retired) = self.retired.take() {
            retired.release();
        }
    }

    /// Release the current session and reinstate the retired one.
    pub fn rollback(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }
        if let Some(current) = self.session.take() {
            current.release();
        }
        self.session = self.retired.take();
    }

    /// Stop every session, running or retired.
    pub fn stop(&mut self) {
        let was_running = self.session.is_some();
        if let Some(session) = self.session.take() {
            session.release();
        }
        self.commit();
        if was_running {
            tracing::info!("Compositor stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the current session's draw loop is still scheduled.
    pub fn is_drawing(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.task.is_running())
            .unwrap_or(false)
    }

    pub fn output_track(&self) -> Option<TrackHandle> {
        self.session.as_ref().map(|s| s.output.clone())
    }

    /// Current camera video feeding the overlay.
    pub fn camera_track(&self) -> Option<TrackHandle> {
        self.session.as_ref().and_then(|s| s.camera.first_video())
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.session.as_ref().map(|s| s.canvas.size())
    }

    pub fn layout(&self) -> &OverlayLayout {
        &self.layout
    }
}
