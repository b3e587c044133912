//! Synthetic device and display acquisition.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::{
    AudioConstraint, CaptureConstraints, DeviceInfo, DeviceKind, DisplayConstraints, FacingMode,
    TrackKind, TrackSource, VideoConstraint,
};
use castline_platform_core::{MediaDevices, MediaStream, MediaTrack};
use parking_lot::Mutex;

use crate::track::SyntheticTrack;

/// Failure the next acquisition should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    NotAllowed,
    Other,
}

impl Failure {
    fn into_error(self, what: &str) -> CastlineError {
        match self {
            Failure::NotFound => CastlineError::device_not_found(what.to_string()),
            Failure::NotAllowed => CastlineError::permission_denied(what.to_string()),
            Failure::Other => CastlineError::acquisition(what.to_string()),
        }
    }
}

/// Record of one `acquire` / `acquire_display` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireCall {
    User(CaptureConstraints),
    Display(DisplayConstraints),
}

#[derive(Debug)]
pub struct SyntheticDevices {
    devices: Mutex<Vec<DeviceInfo>>,
    calls: Mutex<Vec<AcquireCall>>,
    user_failures: Mutex<VecDeque<Failure>>,
    display_failures: Mutex<VecDeque<Failure>>,
    display_resolution: Mutex<(u32, u32)>,
    camera_resolution: (u32, u32),
    tracks: Mutex<Vec<Arc<SyntheticTrack>>>,
    capture_supported: AtomicBool,
    display_supported: AtomicBool,
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticDevices {
    /// One camera, one microphone, one speaker; 1280x720 display.
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(vec![
                device("camera-0", DeviceKind::VideoInput, "Built-in Camera"),
                device("mic-0", DeviceKind::AudioInput, "Built-in Microphone"),
                device("speaker-0", DeviceKind::AudioOutput, "Built-in Speaker"),
            ]),
            calls: Mutex::new(Vec::new()),
            user_failures: Mutex::new(VecDeque::new()),
            display_failures: Mutex::new(VecDeque::new()),
            display_resolution: Mutex::new((1280, 720)),
            camera_resolution: (640, 480),
            tracks: Mutex::new(Vec::new()),
            capture_supported: AtomicBool::new(true),
            display_supported: AtomicBool::new(true),
        }
    }

    pub fn add_device(&self, id: &str, kind: DeviceKind, label: &str) {
        self.devices.lock().push(device(id, kind, label));
    }

    pub fn remove_device(&self, id: &str) {
        self.devices.lock().retain(|d| d.id != id);
    }

    pub fn fail_next_acquire(&self, failure: Failure) {
        self.user_failures.lock().push_back(failure);
    }

    pub fn fail_next_display(&self, failure: Failure) {
        self.display_failures.lock().push_back(failure);
    }

    pub fn set_display_resolution(&self, width: u32, height: u32) {
        *self.display_resolution.lock() = (width, height);
    }

    pub fn set_capture_supported(&self, supported: bool) {
        self.capture_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_display_supported(&self, supported: bool) {
        self.display_supported.store(supported, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<AcquireCall> {
        self.calls.lock().clone()
    }

    /// Every track handed out so far, oldest first.
    pub fn tracks(&self) -> Vec<Arc<SyntheticTrack>> {
        self.tracks.lock().clone()
    }

    /// Handed-out tracks that were never stopped.
    pub fn live_tracks(&self) -> Vec<Arc<SyntheticTrack>> {
        self.tracks
            .lock()
            .iter()
            .filter(|t| t.is_live())
            .cloned()
            .collect()
    }

    pub fn last_display_video(&self) -> Option<Arc<SyntheticTrack>> {
        self.tracks
            .lock()
            .iter()
            .rev()
            .find(|t| t.source() == TrackSource::Display && t.kind() == TrackKind::Video)
            .cloned()
    }

    fn first_device(&self, kind: DeviceKind) -> Option<String> {
        self.devices
            .lock()
            .iter()
            .find(|d| d.kind == kind)
            .map(|d| d.id.clone())
    }

    fn has_device(&self, id: &str, kind: DeviceKind) -> bool {
        self.devices
            .lock()
            .iter()
            .any(|d| d.id == id && d.kind == kind)
    }

    fn resolve_video(
        &self,
        constraint: &VideoConstraint,
    ) -> CastlineResult<Option<Arc<SyntheticTrack>>> {
        let (id, facing) = match constraint {
            VideoConstraint::Disabled => return Ok(None),
            VideoConstraint::AnyDevice => (self.first_device(DeviceKind::VideoInput), None),
            VideoConstraint::SpecificDevice { id } => {
                let found = self.has_device(id, DeviceKind::VideoInput).then(|| id.clone());
                (found, None)
            }
            VideoConstraint::Facing { mode } => {
                (self.first_device(DeviceKind::VideoInput), Some(*mode))
            }
        };
        let id = id.ok_or_else(|| CastlineError::device_not_found("no matching camera"))?;
        let (width, height) = self.camera_resolution;
        Ok(Some(SyntheticTrack::video(
            TrackSource::Device,
            Some(id),
            width,
            height,
            facing.or(Some(FacingMode::User)),
        )))
    }

    fn resolve_audio(
        &self,
        constraint: &AudioConstraint,
    ) -> CastlineResult<Option<Arc<SyntheticTrack>>> {
        let id = match constraint {
            AudioConstraint::Disabled => return Ok(None),
            AudioConstraint::AnyDevice => self.first_device(DeviceKind::AudioInput),
            AudioConstraint::SpecificDevice { id } => {
                self.has_device(id, DeviceKind::AudioInput).then(|| id.clone())
            }
        };
        let id = id.ok_or_else(|| CastlineError::device_not_found("no matching microphone"))?;
        Ok(Some(SyntheticTrack::audio(TrackSource::Device, Some(id))))
    }

    fn hand_out(&self, tracks: Vec<Arc<SyntheticTrack>>) -> MediaStream {
        self.tracks.lock().extend(tracks.iter().cloned());
        MediaStream::new(tracks.into_iter().map(|t| t.handle()).collect())
    }
}

#[async_trait::async_trait]
impl MediaDevices for SyntheticDevices {
    async fn acquire(&self, constraints: &CaptureConstraints) -> CastlineResult<MediaStream> {
        self.calls.lock().push(AcquireCall::User(constraints.clone()));

        if let Some(failure) = self.user_failures.lock().pop_front() {
            return Err(failure.into_error("user media"));
        }
        if constraints.is_empty() {
            return Err(CastlineError::acquisition(
                "at least one of audio and video must be requested",
            ));
        }

        let video = self.resolve_video(&constraints.video)?;
        let audio = self.resolve_audio(&constraints.audio)?;
        Ok(self.hand_out(audio.into_iter().chain(video).collect()))
    }

    async fn acquire_display(
        &self,
        constraints: &DisplayConstraints,
    ) -> CastlineResult<MediaStream> {
        self.calls.lock().push(AcquireCall::Display(*constraints));

        if let Some(failure) = self.display_failures.lock().pop_front() {
            return Err(failure.into_error("display media"));
        }

        let (width, height) = *self.display_resolution.lock();
        let mut tracks = vec![SyntheticTrack::video(
            TrackSource::Display,
            None,
            width,
            height,
            None,
        )];
        if constraints.audio {
            tracks.push(SyntheticTrack::audio(TrackSource::Display, None));
        }
        Ok(self.hand_out(tracks))
    }

    async fn enumerate_devices(&self) -> CastlineResult<Vec<DeviceInfo>> {
        Ok(self.devices.lock().clone())
    }

    fn supports_capture(&self) -> bool {
        self.capture_supported.load(Ordering::SeqCst)
    }

    fn supports_display_capture(&self) -> bool {
        self.display_supported.load(Ordering::SeqCst)
    }
}

fn device(id: &str, kind: DeviceKind, label: &str) -> DeviceInfo {
    DeviceInfo {
        id: id.to_string(),
        kind,
        label: label.to_string(),
    }
}
