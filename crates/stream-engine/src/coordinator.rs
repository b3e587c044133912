//! Device hot-swap coordinator.
//!
//! The public face of the engine. Every operation here turns a user intent
//! (switch publish mode, change device, cap bandwidth, mute, ...) into
//! acquisitions followed by calls into the mixer, compositor, keepalive,
//! and track replacer. New media is always acquired and bound before the
//! media it replaces is released.

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::{
    missing_capture_kinds, AudioConstraint, AudioMode, Bandwidth, CaptureConstraints, DeviceInfo,
    DisplayConstraints, EngineEvent, FacingMode, PublishMode, StreamConfig, TrackKind,
    TrackSource, VideoConstraint,
};
use castline_platform_core::{EncodingParameters, MediaStream, Platform, TrackHandle};
use tokio::sync::broadcast;

use crate::compositor::VideoCompositor;
use crate::events::EventBus;
use crate::keepalive::{CameraKeepalive, MuteController};
use crate::mixer::AudioMixer;
use crate::replace::{ReplaceOptions, TrackReplacer};
use crate::state::StreamStateManager;

/// What to do when display capture is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFallback {
    /// Publish the camera instead.
    #[default]
    Camera,
    /// Report the refusal and leave the current stream alone.
    Fail,
}

type FallbackHandler = Box<dyn Fn(&CastlineError) -> DisplayFallback + Send + Sync>;

/// Why a publish attempt did not complete.
enum PublishFailure {
    /// Display capture was refused; eligible for the camera fallback.
    DisplayDenied(CastlineError),
    Failed(CastlineError),
}

impl From<CastlineError> for PublishFailure {
    fn from(error: CastlineError) -> Self {
        PublishFailure::Failed(error)
    }
}

impl PublishFailure {
    fn into_error(self) -> CastlineError {
        match self {
            PublishFailure::DisplayDenied(e) | PublishFailure::Failed(e) => e,
        }
    }
}

/// Tracks ready to bind for one publish mode.
struct Prepared {
    audio: Option<TrackHandle>,
    video: Option<TrackHandle>,
    display: Option<MediaStream>,
}

pub struct Coordinator {
    config: StreamConfig,
    platform: Platform,
    events: EventBus,
    state: StreamStateManager,
    replacer: TrackReplacer,
    mixer: AudioMixer,
    compositor: VideoCompositor,
    keepalive: CameraKeepalive,
    mute: MuteController,
    bandwidth: Bandwidth,
    display_fallback: Option<FallbackHandler>,
}

impl Coordinator {
    /// Validate `config` and wire every component to `platform`.
    pub fn new(config: StreamConfig, platform: Platform) -> CastlineResult<Self> {
        config.validate()?;

        let events = EventBus::new();
        let state = StreamStateManager::new(
            platform.preview.clone(),
            config.initial_constraints(),
            config.publish_mode,
            config.audio_mode,
        );

        Ok(Self {
            replacer: TrackReplacer::new(platform.senders.clone()),
            mixer: AudioMixer::new(platform.audio.clone()),
            compositor: VideoCompositor::new(platform.render.clone(), &config),
            keepalive: CameraKeepalive::new(platform.render.clone(), &config),
            mute: MuteController::new(platform.meter.clone(), events.clone(), &config),
            bandwidth: config.bandwidth,
            display_fallback: None,
            state,
            events,
            config,
            platform,
        })
    }

    /// Override the default camera fallback on display-capture refusal.
    pub fn set_display_fallback<F>(&mut self, handler: F)
    where
        F: Fn(&CastlineError) -> DisplayFallback + Send + Sync + 'static,
    {
        self.display_fallback = Some(Box::new(handler));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Report whether media capture is possible at all.
    pub fn check_support(&self) -> bool {
        let supported = self.platform.devices.supports_capture();
        self.events.emit(EngineEvent::CapabilitySupport { supported });
        supported
    }

    /// First acquisition, in the configured publish mode.
    pub async fn start(&mut self) -> CastlineResult<PublishMode> {
        self.check_support();
        self.switch_publish_mode(self.config.publish_mode).await
    }

    /// Attach to a transport session and push the current tracks to it.
    pub async fn bind_session(&mut self, session_id: impl Into<String>) -> CastlineResult<()> {
        let session_id = session_id.into();
        self.state.set_session(Some(session_id.clone()));

        for kind in [TrackKind::Audio, TrackKind::Video] {
            let (Some(sender), Some(track)) =
                (self.replacer.sender(&self.state, kind), self.state.track(kind))
            else {
                continue;
            };
            if sender.track_id().as_deref() != Some(track.id()) {
                sender.replace_track(Some(track)).await?;
            }
        }

        if self.bandwidth != Bandwidth::Unlimited {
            match self.apply_bandwidth().await {
                Ok(()) => {}
                Err(CastlineError::SenderCapabilityMissing) => {
                    tracing::warn!("Sender cannot cap bitrate; bandwidth limit not applied");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(session = %session_id, "Transport session bound");
        Ok(())
    }

    pub fn unbind_session(&mut self) {
        if let Some(session) = self.state.session_id() {
            tracing::info!(session, "Transport session unbound");
        }
        self.state.set_session(None);
    }

    // ------------------------------------------------------------------
    // Publish mode
    // ------------------------------------------------------------------

    /// Switch between camera, screen, and screen+camera.
    ///
    /// Returns the mode actually published, which is `Camera` when display
    /// capture was refused and the fallback ran.
    pub async fn switch_publish_mode(&mut self, mode: PublishMode) -> CastlineResult<PublishMode> {
        let devices = &self.platform.devices;
        let missing = if mode.uses_display() && !devices.supports_display_capture() {
            Some("display capture")
        } else if (mode == PublishMode::Camera || mode.uses_compositor())
            && !devices.supports_capture()
        {
            Some("media capture")
        } else {
            None
        };
        if let Some(what) = missing {
            let err = CastlineError::capability_unsupported(format!("{what} is not available"));
            self.events.emit_error(&err);
            return Err(err);
        }

        tracing::info!(from = ?self.state.publish_mode(), to = ?mode, "Switching publish mode");
        match self.publish(mode).await {
            Ok(()) => Ok(mode),
            Err(PublishFailure::Failed(e)) => Err(e),
            Err(PublishFailure::DisplayDenied(e)) => self.fall_back_to_camera(e).await,
        }
    }

    async fn fall_back_to_camera(&mut self, error: CastlineError) -> CastlineResult<PublishMode> {
        self.events.emit_error(&error);
        let decision = self
            .display_fallback
            .as_ref()
            .map(|handler| handler(&error))
            .unwrap_or_default();
        if decision == DisplayFallback::Fail {
            return Err(error);
        }

        if self.state.has_stream() {
            tracing::warn!("Display capture refused; switching the active stream back to camera");
            self.publish(PublishMode::Camera)
                .await
                .map_err(PublishFailure::into_error)?;
        } else {
            tracing::warn!("Display capture refused; falling back to default camera capture");
            let stream = self.acquire(&CaptureConstraints::any()).await?;
            let audio = match self.mixer.apply_gain(&stream) {
                Ok(gained) => gained.first_audio(),
                Err(e) => {
                    stream.stop_all();
                    return Err(e);
                }
            };
            let prepared = Prepared {
                audio,
                video: stream.first_video(),
                display: None,
            };
            self.bind(PublishMode::Camera, prepared, stream.tracks())
                .await?;
        }
        Ok(PublishMode::Camera)
    }

    async fn publish(&mut self, mode: PublishMode) -> Result<(), PublishFailure> {
        let mut attempt = Vec::new();
        let prepared = match self.prepare(mode, &mut attempt).await {
            Ok(prepared) => prepared,
            Err(failure) => {
                self.abort(&attempt);
                return Err(failure);
            }
        };
        self.bind(mode, prepared, &attempt).await?;
        Ok(())
    }

    /// Acquire and process everything `mode` needs. Every acquired track
    /// is pushed to `attempt` so a failure can release it.
    async fn prepare(
        &mut self,
        mode: PublishMode,
        attempt: &mut Vec<TrackHandle>,
    ) -> Result<Prepared, PublishFailure> {
        let audio_mode = self.state.audio_mode();

        if mode == PublishMode::Camera {
            let constraints = self.state.constraints().effective(audio_mode);
            let stream = self.acquire(&constraints).await?;
            attempt.extend(stream.tracks().iter().cloned());
            let microphone = audio_mode.uses_microphone().then(|| stream.clone());
            let audio = self.prepare_audio(None, microphone)?;
            return Ok(Prepared {
                audio,
                video: stream.first_video(),
                display: None,
            });
        }

        let display = self
            .acquire_display(&DisplayConstraints::for_mode(audio_mode))
            .await?;
        attempt.extend(display.tracks().iter().cloned());

        let microphone = self.acquire_microphone().await?;
        if let Some(mic) = &microphone {
            attempt.extend(mic.tracks().iter().cloned());
        }
        let audio = self.prepare_audio(Some(&display), microphone)?;

        let video = if mode.uses_compositor() {
            let camera = self.acquire(&self.state.constraints().video_only()).await?;
            attempt.extend(camera.tracks().iter().cloned());
            Some(self.compositor.start_composite(&display, &camera)?)
        } else {
            display.first_video()
        };

        Ok(Prepared {
            audio,
            video,
            display: Some(display),
        })
    }

    /// Route the audio origins for the current audio mode.
    fn prepare_audio(
        &mut self,
        display: Option<&MediaStream>,
        microphone: Option<MediaStream>,
    ) -> CastlineResult<Option<TrackHandle>> {
        let wants_system = self.state.audio_mode().uses_system_audio();
        let system = display.filter(|d| wants_system && d.first_audio().is_some());

        let audio = match (system, microphone) {
            (Some(display), Some(mic)) => self.mixer.mix_two_origins(display, &mic)?.first_audio(),
            (None, Some(mic)) => self.mixer.apply_gain(&mic)?.first_audio(),
            (Some(display), None) => {
                self.mixer.retire_graph();
                display.first_audio()
            }
            (None, None) => None,
        };
        Ok(audio)
    }

    /// Bind prepared tracks, video first, then commit or roll back.
    async fn bind(
        &mut self,
        mode: PublishMode,
        prepared: Prepared,
        attempt: &[TrackHandle],
    ) -> CastlineResult<()> {
        let options = ReplaceOptions {
            stop_display_source: self.state.display_source().is_some(),
        };
        if let Err(e) = self
            .replacer
            .replace_track(&mut self.state, TrackKind::Video, prepared.video, options)
            .await
        {
            self.abort(attempt);
            return Err(e);
        }

        if mode.uses_compositor() {
            self.compositor.commit();
        } else {
            self.compositor.stop();
        }
        self.state.set_display_source(prepared.display);
        self.state.set_publish_mode(mode);
        self.keepalive.cancel();

        let audio_attempt: Vec<TrackHandle> = attempt
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
            .cloned()
            .collect();
        self.bind_audio(prepared.audio, &audio_attempt).await?;

        tracing::info!(mode = ?mode, audio_mode = ?self.state.audio_mode(), "Publishing");
        Ok(())
    }

    async fn bind_audio(
        &mut self,
        audio: Option<TrackHandle>,
        attempt: &[TrackHandle],
    ) -> CastlineResult<()> {
        let result = match &audio {
            Some(track) => {
                self.mute.apply_to(track);
                self.replacer
                    .replace_track(
                        &mut self.state,
                        TrackKind::Audio,
                        Some(track.clone()),
                        ReplaceOptions::default(),
                    )
                    .await
            }
            None => {
                self.mixer.retire_graph();
                self.replacer
                    .remove_track(&mut self.state, TrackKind::Audio)
                    .await
            }
        };

        if let Err(e) = result {
            self.mixer.rollback();
            for track in attempt {
                track.stop();
            }
            return Err(e);
        }
        self.mixer.commit();
        self.connect_meter().await;
        Ok(())
    }

    fn abort(&mut self, attempt: &[TrackHandle]) {
        self.mixer.rollback();
        self.compositor.rollback();
        for track in attempt {
            track.stop();
        }
        if !attempt.is_empty() {
            tracing::debug!(released = attempt.len(), "Switch abandoned; new tracks released");
        }
    }

    /// Point the level meter at the microphone feeding the mixer.
    ///
    /// Mute disables the bound mixer output only, so the origin keeps
    /// carrying signal while muted.
    async fn connect_meter(&self) {
        let Some(meter) = &self.platform.meter else {
            return;
        };
        let Some(microphone) = self.mixer.microphone_origin() else {
            meter.disconnect();
            return;
        };
        if let Err(e) = meter.connect(&MediaStream::new(vec![microphone])).await {
            tracing::warn!(error = %e, "Sound level meter could not attach");
        }
    }

    // ------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------

    async fn acquire(&self, constraints: &CaptureConstraints) -> CastlineResult<MediaStream> {
        match self.platform.devices.acquire(constraints).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                self.report_acquisition_error(&e).await;
                Err(e)
            }
        }
    }

    async fn acquire_display(
        &self,
        constraints: &DisplayConstraints,
    ) -> Result<MediaStream, PublishFailure> {
        match self.platform.devices.acquire_display(constraints).await {
            Ok(stream) => Ok(stream),
            Err(e @ CastlineError::PermissionDenied { .. }) => Err(PublishFailure::DisplayDenied(e)),
            Err(e) => {
                self.events.emit_error(&e);
                Err(PublishFailure::Failed(e))
            }
        }
    }

    /// Microphone capture for the current audio mode, if it wants one.
    async fn acquire_microphone(&self) -> CastlineResult<Option<MediaStream>> {
        let constraints = self.state.constraints().audio_only();
        if !self.state.audio_mode().uses_microphone() || !constraints.audio.is_enabled() {
            return Ok(None);
        }
        self.acquire(&constraints).await.map(Some)
    }

    async fn report_acquisition_error(&self, error: &CastlineError) {
        match error {
            CastlineError::DeviceNotFound { .. } => {
                tracing::warn!(error = %error, "Capture device missing; re-enumerating");
                if let Err(e) = self.handle_device_change().await {
                    tracing::warn!(error = %e, "Device re-enumeration failed");
                }
            }
            _ => {
                tracing::warn!(error = %error, "Acquisition failed");
                self.events.emit_error(error);
            }
        }
    }

    /// Respond to a device-change notification from the platform.
    pub async fn handle_device_change(&self) -> CastlineResult<Vec<DeviceInfo>> {
        let devices = match self.platform.devices.enumerate_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                self.events.emit_error(&e);
                return Err(e);
            }
        };
        tracing::debug!(count = devices.len(), "Devices enumerated");
        self.events.emit(EngineEvent::DevicesChanged {
            devices: devices.clone(),
        });
        for kind in missing_capture_kinds(&devices) {
            let err = CastlineError::device_not_found(format!("no {kind:?} device available"));
            self.events.emit_error(&err);
        }
        Ok(devices)
    }

    // ------------------------------------------------------------------
    // Audio
    // ------------------------------------------------------------------

    /// Hot-swap the microphone.
    ///
    /// The selection is always stored. With nothing published, or in an
    /// audio mode without a microphone, it only takes effect later.
    pub async fn switch_audio_device(&mut self, device_id: impl Into<String>) -> CastlineResult<()> {
        let id = device_id.into();
        self.state.constraints_mut().audio = AudioConstraint::SpecificDevice { id: id.clone() };

        if !self.state.audio_mode().uses_microphone() || !self.state.has_stream() {
            tracing::info!(device = %id, "Microphone selection stored");
            return Ok(());
        }

        // Release the device before asking for it again.
        if let Some(mic) = self.current_microphone() {
            mic.stop();
        }
        if let Err(e) = self.rebuild_audio().await {
            tracing::warn!(
                device = %id,
                error = %e,
                "Microphone switch failed after the previous device was released; outbound audio is silent"
            );
            return Err(e);
        }
        tracing::info!(device = %id, "Microphone switched");
        Ok(())
    }

    /// Change the audio topology.
    ///
    /// The effective video constraint is applied live to the running
    /// camera, then the audio path is rebuilt from the current display
    /// capture (if any) and a fresh microphone.
    pub async fn switch_audio_mode(&mut self, mode: AudioMode) -> CastlineResult<()> {
        let previous = self.state.audio_mode();
        self.state.set_audio_mode(mode);

        let effective = self.state.constraints().effective(mode);
        if effective.video.is_enabled() {
            if let Some(camera) = self.current_camera() {
                if let Err(e) = camera.apply_constraints(&effective.video).await {
                    self.state.set_audio_mode(previous);
                    self.events.emit_error(&e);
                    return Err(e);
                }
            }
        }

        if !self.state.has_stream() {
            return Ok(());
        }
        if mode.uses_microphone() {
            if let Some(mic) = self.current_microphone() {
                mic.stop();
            }
        }
        self.rebuild_audio().await?;
        tracing::info!(from = ?previous, to = ?mode, "Audio mode switched");
        Ok(())
    }

    async fn rebuild_audio(&mut self) -> CastlineResult<()> {
        let display = self.state.display_source().cloned();
        let microphone = self.acquire_microphone().await?;
        let attempt: Vec<TrackHandle> = microphone
            .iter()
            .flat_map(|m| m.tracks().iter().cloned())
            .collect();

        let audio = match self.prepare_audio(display.as_ref(), microphone) {
            Ok(audio) => audio,
            Err(e) => {
                self.mixer.rollback();
                for track in &attempt {
                    track.stop();
                }
                return Err(e);
            }
        };
        self.bind_audio(audio, &attempt).await
    }

    fn current_microphone(&self) -> Option<TrackHandle> {
        self.mixer.microphone_origin().or_else(|| {
            self.state
                .track(TrackKind::Audio)
                .filter(|t| t.source() == TrackSource::Device)
        })
    }

    /// Remembered and applied to every audio graph, now and later.
    pub fn set_volume(&mut self, volume: f32) {
        self.mixer.set_volume(volume);
    }

    /// Make the mixed microphone audible or silent without a rebuild.
    pub fn set_secondary_audio_enabled(&mut self, enabled: bool) {
        self.mixer.set_secondary_enabled(enabled);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.mute.set_muted(&self.state, muted);
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.mute.toggle_mute(&self.state)
    }

    // ------------------------------------------------------------------
    // Video
    // ------------------------------------------------------------------

    pub async fn switch_video_device(&mut self, device_id: impl Into<String>) -> CastlineResult<()> {
        self.switch_camera(VideoConstraint::SpecificDevice {
            id: device_id.into(),
        })
        .await
    }

    pub async fn switch_facing_mode(&mut self, mode: FacingMode) -> CastlineResult<()> {
        self.switch_camera(VideoConstraint::Facing { mode }).await
    }

    /// Switch to the opposite facing mode. Returns the new one.
    pub async fn flip_camera(&mut self) -> CastlineResult<FacingMode> {
        let current = match &self.state.constraints().video {
            VideoConstraint::Facing { mode } => *mode,
            _ => self
                .current_camera()
                .and_then(|t| t.settings().facing_mode)
                .unwrap_or(FacingMode::User),
        };
        let next = current.flipped();
        self.switch_facing_mode(next).await?;
        Ok(next)
    }

    async fn switch_camera(&mut self, constraint: VideoConstraint) -> CastlineResult<()> {
        tracing::info!(constraint = ?constraint, "Switching camera");
        self.state.constraints_mut().video = constraint;

        if !self.keepalive.camera_enabled() {
            tracing::info!("Camera disabled; selection applies when re-enabled");
            return Ok(());
        }

        match self.state.publish_mode() {
            PublishMode::Screen => Ok(()),
            PublishMode::Camera => {
                if !self.state.has_stream() {
                    return Ok(());
                }
                if let Some(current) = self.current_camera() {
                    current.stop();
                }
                let stream = self.acquire(&self.state.constraints().video_only()).await?;
                if let Err(e) = self
                    .replacer
                    .replace_track(
                        &mut self.state,
                        TrackKind::Video,
                        stream.first_video(),
                        ReplaceOptions::default(),
                    )
                    .await
                {
                    stream.stop_all();
                    return Err(e);
                }
                Ok(())
            }
            PublishMode::ScreenAndCamera => {
                if !self.compositor.is_active() {
                    return Ok(());
                }
                if let Some(current) = self.compositor.camera_track() {
                    current.stop();
                }
                let stream = self.acquire(&self.state.constraints().video_only()).await?;
                if let Err(e) = self.compositor.swap_camera(&stream) {
                    stream.stop_all();
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// The running camera track, bound directly or feeding the compositor.
    fn current_camera(&self) -> Option<TrackHandle> {
        self.state
            .track(TrackKind::Video)
            .filter(|t| t.source() == TrackSource::Device)
            .or_else(|| self.compositor.camera_track())
    }

    /// Replace the camera with refreshed blank frames.
    pub async fn disable_camera(&mut self) -> CastlineResult<()> {
        if self.state.publish_mode() != PublishMode::Camera {
            let err = CastlineError::no_active_session("camera is not the published video");
            self.events.emit_error(&err);
            return Err(err);
        }
        self.keepalive
            .disable_camera(&mut self.state, &self.replacer)
            .await
    }

    /// Re-acquire the camera and bind it in place of the blank frames.
    pub async fn enable_camera(&mut self) -> CastlineResult<()> {
        if self.keepalive.camera_enabled() {
            return Ok(());
        }
        let stream = self.acquire(&self.state.constraints().video_only()).await?;
        let camera = stream
            .first_video()
            .ok_or_else(|| CastlineError::acquisition("camera capture returned no video"))?;
        self.keepalive
            .enable_camera(&mut self.state, &self.replacer, camera)
            .await
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Cap or uncap the outbound video bitrate.
    ///
    /// The value is remembered for the next [`bind_session`](Self::bind_session)
    /// even when it cannot be applied now.
    pub async fn set_bandwidth(&mut self, bandwidth: Bandwidth) -> CastlineResult<()> {
        self.bandwidth = bandwidth;
        match self.apply_bandwidth().await {
            Ok(()) => {
                tracing::info!(bandwidth = ?bandwidth, "Bandwidth applied");
                Ok(())
            }
            Err(e) => {
                self.events.emit_error(&e);
                Err(e)
            }
        }
    }

    async fn apply_bandwidth(&self) -> CastlineResult<()> {
        let sender = self
            .replacer
            .sender(&self.state, TrackKind::Video)
            .ok_or_else(|| CastlineError::no_active_session("no video sender is publishing"))?;
        if !sender.supports_parameters() {
            return Err(CastlineError::SenderCapabilityMissing);
        }

        let mut parameters = sender.parameters().await?;
        if parameters.encodings.is_empty() {
            parameters.encodings.push(EncodingParameters::default());
        }
        let cap = self.bandwidth.max_bitrate_bps();
        for encoding in &mut parameters.encodings {
            encoding.max_bitrate_bps = cap;
        }
        sender.set_parameters(parameters).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The platform ended a track on its own. Returns `true` if it was the
    /// shared screen.
    ///
    /// A stopped screen share republishes the camera. The display capture
    /// and the compositor are released only once the camera is bound; if
    /// that fails the current tracks stay bound and the error is returned.
    pub async fn on_track_ended(&mut self, track_id: &str) -> CastlineResult<bool> {
        let is_screen = self.state.display_source().is_some_and(|display| {
            display.video_tracks().any(|t| t.id() == track_id)
        });
        if !is_screen {
            return Ok(false);
        }

        tracing::info!(track = track_id, "Screen share stopped by the platform");
        self.events.emit(EngineEvent::ScreenShareStopped);
        if let Err(failure) = self.publish(PublishMode::Camera).await {
            let e = failure.into_error();
            tracing::warn!(error = %e, "Camera could not replace the stopped screen share");
            return Err(e);
        }
        Ok(true)
    }

    /// Cancel every recurring task and stop every track.
    pub fn close(&mut self) {
        self.keepalive.cancel();
        self.mute.shutdown();
        self.compositor.stop();
        self.mixer.teardown();
        if let Some(meter) = &self.platform.meter {
            meter.disconnect();
        }
        self.state.close_stream();
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> &StreamStateManager {
        &self.state
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn compositor(&self) -> &VideoCompositor {
        &self.compositor
    }

    pub fn keepalive(&self) -> &CameraKeepalive {
        &self.keepalive
    }

    pub fn mute(&self) -> &MuteController {
        &self.mute
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn publish_mode(&self) -> PublishMode {
        self.state.publish_mode()
    }

    pub fn audio_mode(&self) -> AudioMode {
        self.state.audio_mode()
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.keepalive.cancel();
        self.mute.shutdown();
        self.compositor.stop();
    }
}

#[cfg(test)]
mod tests {
    use castline_common::error::ErrorKind;
    use castline_platform_core::MediaTrack;
    use castline_platform_synthetic::{Failure, SyntheticPlatform};

    use super::*;

    fn coordinator(config: StreamConfig) -> (Coordinator, SyntheticPlatform) {
        let synthetic = SyntheticPlatform::new();
        let coordinator = Coordinator::new(config, synthetic.platform()).unwrap();
        (coordinator, synthetic)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = StreamConfig {
            camera_percent: 0.0,
            ..StreamConfig::default()
        };
        let err = Coordinator::new(config, SyntheticPlatform::new().platform())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn start_publishes_camera_with_gained_microphone() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        let mut events = coordinator.subscribe();

        assert_eq!(coordinator.start().await.unwrap(), PublishMode::Camera);
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::CapabilitySupport { supported: true }
        );

        let stream = coordinator.state().stream().unwrap();
        assert_eq!(stream.video().unwrap().source(), TrackSource::Device);
        assert_eq!(stream.audio().unwrap().source(), TrackSource::Synthetic);
        assert!(coordinator.mixer().is_active());
        assert!(synthetic.meter.is_connected());
    }

    #[tokio::test]
    async fn unsupported_display_capture_is_named() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        synthetic.devices.set_display_supported(false);
        let mut events = coordinator.subscribe();

        let err = coordinator
            .switch_publish_mode(PublishMode::Screen)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnsupported);
        assert!(matches!(
            events.try_recv().unwrap(),
            EngineEvent::Error { kind: ErrorKind::CapabilityUnsupported, .. }
        ));
    }

    #[tokio::test]
    async fn display_denied_with_fail_handler_keeps_stream() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator.start().await.unwrap();
        let video = coordinator.state().track(TrackKind::Video).unwrap();

        coordinator.set_display_fallback(|_| DisplayFallback::Fail);
        synthetic.devices.fail_next_display(Failure::NotAllowed);
        let err = coordinator
            .switch_publish_mode(PublishMode::Screen)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(coordinator.publish_mode(), PublishMode::Camera);
        assert_eq!(coordinator.state().track(TrackKind::Video).unwrap().id(), video.id());
        assert!(video.is_live());
    }

    #[tokio::test]
    async fn display_denied_while_active_republishes_camera() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator.switch_publish_mode(PublishMode::Screen).await.unwrap();
        let screen = synthetic.devices.last_display_video().unwrap();

        synthetic.devices.fail_next_display(Failure::NotAllowed);
        let mode = coordinator
            .switch_publish_mode(PublishMode::ScreenAndCamera)
            .await
            .unwrap();

        assert_eq!(mode, PublishMode::Camera);
        assert_eq!(coordinator.publish_mode(), PublishMode::Camera);
        assert!(!screen.is_live());
        assert!(coordinator.state().display_source().is_none());
    }

    #[tokio::test]
    async fn device_not_found_re_enumerates() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        synthetic.devices.remove_device("camera-0");
        let mut events = coordinator.subscribe();

        let err = coordinator.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);

        let mut saw_snapshot = false;
        let mut saw_missing = false;
        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::DevicesChanged { devices } => {
                    saw_snapshot = true;
                    assert!(devices.iter().all(|d| d.id != "camera-0"));
                }
                EngineEvent::Error { kind: ErrorKind::DeviceNotFound, .. } => saw_missing = true,
                _ => {}
            }
        }
        assert!(saw_snapshot && saw_missing);
    }

    #[tokio::test]
    async fn switch_audio_device_outside_microphone_mode_only_stores() {
        let config = StreamConfig {
            audio_mode: AudioMode::System,
            ..StreamConfig::default()
        };
        let (mut coordinator, synthetic) = coordinator(config);
        coordinator.start().await.unwrap();
        let calls = synthetic.devices.calls().len();

        coordinator.switch_audio_device("mic-0").await.unwrap();
        assert_eq!(synthetic.devices.calls().len(), calls);
        assert_eq!(
            coordinator.state().constraints().audio,
            AudioConstraint::SpecificDevice { id: "mic-0".into() }
        );
    }

    #[tokio::test]
    async fn failed_microphone_switch_keeps_bound_audio() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator.start().await.unwrap();
        let bound = coordinator.state().track(TrackKind::Audio).unwrap();
        let old_mic = coordinator.mixer().microphone_origin().unwrap();

        synthetic.devices.fail_next_acquire(Failure::Other);
        let err = coordinator.switch_audio_device("mic-0").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert!(!old_mic.is_live());
        assert_eq!(coordinator.state().track(TrackKind::Audio).unwrap().id(), bound.id());
        assert_eq!(synthetic.audio.open_contexts(), 1);
    }

    #[tokio::test]
    async fn audio_mode_switch_applies_live_video_constraint() {
        let config = StreamConfig {
            video: VideoConstraint::Facing {
                mode: FacingMode::Environment,
            },
            ..StreamConfig::default()
        };
        let (mut coordinator, synthetic) = coordinator(config);
        coordinator.start().await.unwrap();
        let acquisitions = synthetic
            .devices
            .tracks()
            .iter()
            .filter(|t| t.kind() == TrackKind::Video)
            .count();

        coordinator.switch_audio_mode(AudioMode::System).await.unwrap();

        let camera = synthetic
            .devices
            .tracks()
            .into_iter()
            .find(|t| t.kind() == TrackKind::Video)
            .unwrap();
        assert_eq!(
            camera.applied_constraints(),
            vec![VideoConstraint::Facing {
                mode: FacingMode::Environment
            }]
        );
        let after = synthetic
            .devices
            .tracks()
            .iter()
            .filter(|t| t.kind() == TrackKind::Video)
            .count();
        assert_eq!(after, acquisitions);
        // Camera publishing has no system audio to fall back on.
        assert!(coordinator.state().track(TrackKind::Audio).is_none());
    }

    #[tokio::test]
    async fn flip_camera_reacquires_with_opposite_facing() {
        let (mut coordinator, _) = coordinator(StreamConfig::default());
        coordinator.start().await.unwrap();
        let before = coordinator.state().track(TrackKind::Video).unwrap();

        assert_eq!(coordinator.flip_camera().await.unwrap(), FacingMode::Environment);
        let after = coordinator.state().track(TrackKind::Video).unwrap();

        assert!(!before.is_live());
        assert_eq!(after.settings().facing_mode, Some(FacingMode::Environment));
    }

    #[tokio::test]
    async fn bandwidth_without_session_is_rejected() {
        let (mut coordinator, _) = coordinator(StreamConfig::default());
        coordinator.start().await.unwrap();
        let err = coordinator
            .set_bandwidth(Bandwidth::Kbps(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);
        assert_eq!(coordinator.bandwidth(), Bandwidth::Kbps(500));
    }

    #[tokio::test]
    async fn bandwidth_without_parameter_support_is_named() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        synthetic.senders.open_session("s1");
        coordinator.start().await.unwrap();
        coordinator.bind_session("s1").await.unwrap();
        synthetic
            .senders
            .sender("s1", TrackKind::Video)
            .unwrap()
            .set_parameters_supported(false);

        let err = coordinator
            .set_bandwidth(Bandwidth::Kbps(800))
            .await
            .unwrap_err();
        assert!(matches!(err, CastlineError::SenderCapabilityMissing));
    }

    #[tokio::test]
    async fn bind_session_pushes_tracks_and_remembered_cap() {
        let config = StreamConfig {
            bandwidth: Bandwidth::Kbps(1200),
            ..StreamConfig::default()
        };
        let (mut coordinator, synthetic) = coordinator(config);
        coordinator.start().await.unwrap();
        synthetic.senders.open_session("s1");
        coordinator.bind_session("s1").await.unwrap();

        let video = synthetic.senders.sender("s1", TrackKind::Video).unwrap();
        let audio = synthetic.senders.sender("s1", TrackKind::Audio).unwrap();
        let bound = coordinator.state().track(TrackKind::Video).unwrap();
        assert_eq!(video.current_track().unwrap().id(), bound.id());
        assert!(audio.current_track().is_some());
        assert_eq!(
            video.committed().last().unwrap().encodings[0].max_bitrate_bps,
            Some(1_200_000)
        );
    }

    #[tokio::test]
    async fn disable_camera_outside_camera_mode_is_rejected() {
        let (mut coordinator, _) = coordinator(StreamConfig::default());
        coordinator.switch_publish_mode(PublishMode::Screen).await.unwrap();
        let err = coordinator.disable_camera().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);
    }

    #[tokio::test]
    async fn screen_ended_by_platform_is_reported() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator
            .switch_publish_mode(PublishMode::ScreenAndCamera)
            .await
            .unwrap();
        let mut events = coordinator.subscribe();
        let screen = synthetic.devices.last_display_video().unwrap();

        screen.end();
        assert!(coordinator.on_track_ended(screen.id()).await.unwrap());
        assert_eq!(events.try_recv().unwrap(), EngineEvent::ScreenShareStopped);
        assert!(!coordinator.compositor().is_active());

        let video = coordinator.state().track(TrackKind::Video).unwrap();
        assert!(video.is_live());
        assert_eq!(video.source(), TrackSource::Device);
        assert_eq!(coordinator.publish_mode(), PublishMode::Camera);
        assert!(coordinator.state().display_source().is_none());

        assert!(!coordinator.on_track_ended("unrelated").await.unwrap());
    }

    #[tokio::test]
    async fn screen_ended_keeps_bound_tracks_when_camera_fails() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator.switch_publish_mode(PublishMode::Screen).await.unwrap();
        let screen = synthetic.devices.last_display_video().unwrap();
        let audio = coordinator.state().track(TrackKind::Audio).unwrap();

        synthetic.devices.fail_next_acquire(Failure::NotAllowed);
        screen.end();
        let err = coordinator.on_track_ended(screen.id()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(coordinator.publish_mode(), PublishMode::Screen);
        assert!(audio.is_live());
        assert_eq!(coordinator.state().track(TrackKind::Audio).unwrap().id(), audio.id());
    }

    #[tokio::test]
    async fn close_stops_every_acquired_track() {
        let (mut coordinator, synthetic) = coordinator(StreamConfig::default());
        coordinator
            .switch_publish_mode(PublishMode::ScreenAndCamera)
            .await
            .unwrap();
        coordinator.close();

        assert!(synthetic.devices.live_tracks().is_empty());
        assert!(!coordinator.compositor().is_drawing());
        assert_eq!(synthetic.audio.open_contexts(), 0);
        assert_eq!(synthetic.preview.current(), None);
    }
}
