//! Synthetic transport senders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::TrackKind;
use castline_platform_core::{
    EncodingParameters, MediaTrack, SendParameters, TrackHandle, TrackSender,
    TrackSenderRegistry,
};
use parking_lot::Mutex;

pub struct SyntheticSender {
    kind: TrackKind,
    current: Mutex<Option<TrackHandle>>,
    replaced: Mutex<Vec<Option<String>>>,
    fail_next_replace: AtomicBool,
    parameters_supported: AtomicBool,
    parameters: Mutex<SendParameters>,
    commits: Mutex<Vec<SendParameters>>,
}

impl SyntheticSender {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            current: Mutex::new(None),
            replaced: Mutex::new(Vec::new()),
            fail_next_replace: AtomicBool::new(false),
            parameters_supported: AtomicBool::new(true),
            parameters: Mutex::new(SendParameters {
                encodings: vec![EncodingParameters::default()],
            }),
            commits: Mutex::new(Vec::new()),
        })
    }

    pub fn current_track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    /// Track ids passed to `replace_track`, in order.
    pub fn replacements(&self) -> Vec<Option<String>> {
        self.replaced.lock().clone()
    }

    pub fn fail_next_replace(&self) {
        self.fail_next_replace.store(true, Ordering::SeqCst);
    }

    pub fn set_parameters_supported(&self, supported: bool) {
        self.parameters_supported.store(supported, Ordering::SeqCst);
    }

    pub fn committed(&self) -> Vec<SendParameters> {
        self.commits.lock().clone()
    }
}

#[async_trait::async_trait]
impl TrackSender for SyntheticSender {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn track_id(&self) -> Option<String> {
        self.current.lock().as_ref().map(|t| t.id().to_string())
    }

    async fn replace_track(&self, track: Option<TrackHandle>) -> CastlineResult<()> {
        if self.fail_next_replace.swap(false, Ordering::SeqCst) {
            return Err(CastlineError::sender("replace_track rejected"));
        }
        if let Some(track) = &track {
            if track.kind() != self.kind {
                return Err(CastlineError::sender(format!(
                    "cannot send {} track on {} sender",
                    track.kind(),
                    self.kind
                )));
            }
        }
        self.replaced
            .lock()
            .push(track.as_ref().map(|t| t.id().to_string()));
        *self.current.lock() = track;
        Ok(())
    }

    fn supports_parameters(&self) -> bool {
        self.parameters_supported.load(Ordering::SeqCst)
    }

    async fn parameters(&self) -> CastlineResult<SendParameters> {
        Ok(self.parameters.lock().clone())
    }

    async fn set_parameters(&self, parameters: SendParameters) -> CastlineResult<()> {
        self.commits.lock().push(parameters.clone());
        *self.parameters.lock() = parameters;
        Ok(())
    }
}

/// Registry holding one audio and one video sender per session.
#[derive(Default)]
pub struct SyntheticSenderRegistry {
    senders: Mutex<HashMap<(String, TrackKind), Arc<SyntheticSender>>>,
}

impl SyntheticSenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start publishing: create both senders for `session_id`.
    pub fn open_session(&self, session_id: &str) {
        let mut senders = self.senders.lock();
        for kind in [TrackKind::Audio, TrackKind::Video] {
            senders
                .entry((session_id.to_string(), kind))
                .or_insert_with(|| SyntheticSender::new(kind));
        }
    }

    pub fn close_session(&self, session_id: &str) {
        self.senders.lock().retain(|(id, _), _| id != session_id);
    }

    pub fn sender(&self, session_id: &str, kind: TrackKind) -> Option<Arc<SyntheticSender>> {
        self.senders
            .lock()
            .get(&(session_id.to_string(), kind))
            .cloned()
    }
}

impl TrackSenderRegistry for SyntheticSenderRegistry {
    fn lookup(&self, session_id: &str, kind: TrackKind) -> Option<Arc<dyn TrackSender>> {
        self.sender(session_id, kind).map(|s| s as Arc<dyn TrackSender>)
    }
}
