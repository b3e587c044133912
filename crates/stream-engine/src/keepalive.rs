//! Audio mute and camera keepalive.
//!
//! The two controls are independent: muting only flips the enabled flag of
//! the bound audio, and the camera keepalive only ever replaces video.

use std::sync::Arc;
use std::time::Duration;

use castline_common::error::{CastlineError, CastlineResult};
use castline_common::PeriodicTask;
use castline_media_model::{BlankFrame, EngineEvent, StreamConfig, TrackKind};
use castline_platform_core::{Rect, RenderBackend, SoundLevelMeter, TrackHandle};

use crate::events::EventBus;
use crate::replace::{ReplaceOptions, TrackReplacer};
use crate::state::StreamStateManager;

/// Frame rate of the blank-frame capture. The refresh task, not the
/// capture rate, keeps the track producing data.
const BLANK_CAPTURE_FPS: u32 = 1;

/// Sends a refreshed blank frame in place of the camera while it is
/// disabled.
pub struct CameraKeepalive {
    render: Arc<dyn RenderBackend>,
    frame: BlankFrame,
    interval: Duration,
    camera_enabled: bool,
    task: Option<PeriodicTask>,
}

impl CameraKeepalive {
    pub fn new(render: Arc<dyn RenderBackend>, config: &StreamConfig) -> Self {
        Self {
            render,
            frame: config.blank_frame,
            interval: config.keepalive_interval(),
            camera_enabled: true,
            task: None,
        }
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled
    }

    /// Whether the blank-frame refresh is scheduled.
    pub fn is_refreshing(&self) -> bool {
        self.task.as_ref().map(|t| t.is_running()).unwrap_or(false)
    }

    /// Refreshes performed by the current task.
    pub fn refresh_count(&self) -> u64 {
        self.task.as_ref().map(|t| t.ticks()).unwrap_or(0)
    }

    /// Bind a blank-frame track in place of the camera and start
    /// refreshing it. A no-op if the camera is already disabled.
    pub async fn disable_camera(
        &mut self,
        state: &mut StreamStateManager,
        replacer: &TrackReplacer,
    ) -> CastlineResult<()> {
        if !self.camera_enabled {
            return Ok(());
        }

        let BlankFrame {
            width,
            height,
            color,
        } = self.frame;
        let canvas = self.render.create_canvas(width, height)?;
        let area = Rect::full(width, height);
        canvas.fill(color, area);
        let blank = canvas.capture(BLANK_CAPTURE_FPS)?;

        if let Err(e) = replacer
            .replace_track(state, TrackKind::Video, Some(blank.clone()), ReplaceOptions::default())
            .await
        {
            blank.stop();
            return Err(e);
        }

        self.task = Some(PeriodicTask::spawn("keepalive", self.interval, move || {
            canvas.fill(color, area);
        }));
        self.camera_enabled = false;
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Camera disabled; sending blank frames"
        );
        Ok(())
    }

    /// Bind `camera` again and stop the blank-frame refresh.
    ///
    /// If the replacement fails the keepalive stays in place and `camera`
    /// is stopped.
    pub async fn enable_camera(
        &mut self,
        state: &mut StreamStateManager,
        replacer: &TrackReplacer,
        camera: TrackHandle,
    ) -> CastlineResult<()> {
        if self.camera_enabled {
            camera.stop();
            return Err(CastlineError::no_active_session("camera is not disabled"));
        }
        if let Err(e) = replacer
            .replace_track(state, TrackKind::Video, Some(camera.clone()), ReplaceOptions::default())
            .await
        {
            camera.stop();
            return Err(e);
        }
        self.cancel();
        tracing::info!(track = camera.id(), "Camera enabled");
        Ok(())
    }

    /// Stop refreshing and forget the disabled state.
    ///
    /// The blank track stays bound until something replaces it.
    pub fn cancel(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
        self.camera_enabled = true;
    }
}

/// Audio mute plus the speaking-while-muted monitor.
pub struct MuteController {
    muted: bool,
    meter: Option<Arc<dyn SoundLevelMeter>>,
    events: EventBus,
    threshold: f64,
    poll: Duration,
    monitor: Option<PeriodicTask>,
}

impl MuteController {
    pub fn new(
        meter: Option<Arc<dyn SoundLevelMeter>>,
        events: EventBus,
        config: &StreamConfig,
    ) -> Self {
        Self {
            muted: false,
            meter,
            events,
            threshold: config.speaking_threshold,
            poll: config.speaking_poll_interval(),
            monitor: None,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Enable or disable every bound audio track. Nothing is replaced.
    pub fn set_muted(&mut self, state: &StreamStateManager, muted: bool) {
        self.muted = muted;
        if let Some(track) = state.track(TrackKind::Audio) {
            track.set_enabled(!muted);
        }
        self.update_monitor();
        tracing::info!(muted, "Audio mute set");
    }

    /// Flip the enabled flag of every bound audio track. Returns the new
    /// mute state.
    pub fn toggle_mute(&mut self, state: &StreamStateManager) -> bool {
        self.muted = !self.muted;
        if let Some(track) = state.track(TrackKind::Audio) {
            track.set_enabled(!track.is_enabled());
        }
        self.update_monitor();
        tracing::info!(muted = self.muted, "Audio mute toggled");
        self.muted
    }

    /// Carry the mute state onto a newly bound audio track.
    pub fn apply_to(&self, track: &TrackHandle) {
        track.set_enabled(!self.muted);
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().map(|t| t.is_running()).unwrap_or(false)
    }

    fn update_monitor(&mut self) {
        if !self.muted {
            if let Some(mut monitor) = self.monitor.take() {
                monitor.cancel();
            }
            return;
        }
        if self.monitor.is_some() {
            return;
        }
        let Some(meter) = self.meter.clone() else {
            return;
        };
        let events = self.events.clone();
        let threshold = self.threshold;
        let mut speaking = false;
        self.monitor = Some(PeriodicTask::spawn("speaking-monitor", self.poll, move || {
            let above = meter.instant() > threshold;
            if above && !speaking {
                events.emit(EngineEvent::SpeakingWhileMuted);
            }
            speaking = above;
        }));
    }

    /// Cancel the monitor. Mute state is kept.
    pub fn shutdown(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use castline_media_model::{AudioMode, CaptureConstraints, PublishMode, TrackSource};
    use castline_platform_core::MediaStream;
    use castline_platform_synthetic::{
        DrawOp, SyntheticMeter, SyntheticPreview, SyntheticRender, SyntheticSenderRegistry,
        SyntheticTrack,
    };

    use super::*;
    use crate::state::LocalStream;

    fn state() -> StreamStateManager {
        StreamStateManager::new(
            Arc::new(SyntheticPreview::new()),
            CaptureConstraints::any(),
            PublishMode::Camera,
            AudioMode::Microphone,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn blank_frame_refreshes_until_enabled() {
        let render = Arc::new(SyntheticRender::new());
        let replacer = TrackReplacer::new(Arc::new(SyntheticSenderRegistry::new()));
        let mut keepalive = CameraKeepalive::new(render.clone(), &StreamConfig::default());
        let mut state = state();
        let camera = SyntheticTrack::video(TrackSource::Device, None, 640, 480, None).handle();
        state.set_stream(LocalStream::new(None, Some(camera.clone())));

        keepalive.disable_camera(&mut state, &replacer).await.unwrap();
        assert!(!keepalive.camera_enabled());
        assert!(!camera.is_live());
        let blank = state.track(TrackKind::Video).unwrap();
        assert_eq!(blank.source(), TrackSource::Synthetic);

        // One initial fill plus refreshes at t = 0, 3000, 6000, 9000.
        tokio::time::sleep(Duration::from_millis(9500)).await;
        let canvas = render.canvases()[0].clone();
        assert_eq!(canvas.fill_count(), 5);
        assert!(canvas
            .ops()
            .iter()
            .all(|op| matches!(op, DrawOp::Fill { color: [0, 0, 0], .. })));

        let again = SyntheticTrack::video(TrackSource::Device, None, 640, 480, None).handle();
        keepalive.enable_camera(&mut state, &replacer, again.clone()).await.unwrap();
        assert!(keepalive.camera_enabled());
        assert!(!keepalive.is_refreshing());
        assert!(!blank.is_live());

        let fills = canvas.fill_count();
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(canvas.fill_count(), fills);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_enable_keeps_keepalive_running() {
        let senders = Arc::new(SyntheticSenderRegistry::new());
        senders.open_session("s1");
        let replacer = TrackReplacer::new(senders.clone());
        let mut keepalive =
            CameraKeepalive::new(Arc::new(SyntheticRender::new()), &StreamConfig::default());
        let mut state = state();
        state.set_session(Some("s1".into()));

        keepalive.disable_camera(&mut state, &replacer).await.unwrap();
        senders
            .sender("s1", TrackKind::Video)
            .unwrap()
            .fail_next_replace();

        let camera = SyntheticTrack::video(TrackSource::Device, None, 640, 480, None).handle();
        assert!(keepalive
            .enable_camera(&mut state, &replacer, camera.clone())
            .await
            .is_err());
        assert!(!keepalive.camera_enabled());
        assert!(keepalive.is_refreshing());
        assert!(!camera.is_live());
    }

    #[test]
    fn double_toggle_restores_enabled_state() {
        let mut state = state();
        let audio = SyntheticTrack::audio(TrackSource::Device, None).handle();
        state.set_stream(LocalStream::new(Some(audio.clone()), None));
        let mut mute = MuteController::new(None, EventBus::new(), &StreamConfig::default());

        assert!(mute.toggle_mute(&state));
        assert!(!audio.is_enabled());
        assert!(!mute.toggle_mute(&state));
        assert!(audio.is_enabled());
        assert!(audio.is_live());
        assert_eq!(state.track(TrackKind::Audio).unwrap().id(), audio.id());
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_while_muted_fires_once_per_rise() {
        let meter = Arc::new(SyntheticMeter::new());
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut mute = MuteController::new(Some(meter.clone()), events, &StreamConfig::default());
        let state = state();
        let origin = SyntheticTrack::audio(TrackSource::Device, None).handle();
        meter
            .connect(&MediaStream::new(vec![origin]))
            .await
            .unwrap();

        mute.set_muted(&state, true);
        assert!(mute.is_monitoring());

        meter.set_level(0.5);
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::SpeakingWhileMuted);
        assert!(rx.try_recv().is_err());

        meter.set_level(0.0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        meter.set_level(0.9);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::SpeakingWhileMuted);

        mute.set_muted(&state, false);
        assert!(!mute.is_monitoring());
    }
}
