//! Transport-session track senders.

use std::sync::Arc;

use castline_common::error::CastlineResult;
use castline_media_model::TrackKind;

use crate::track::TrackHandle;

/// Per-encoding send parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingParameters {
    pub rid: Option<String>,
    /// `None` means no cap.
    pub max_bitrate_bps: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendParameters {
    pub encodings: Vec<EncodingParameters>,
}

/// Transmits one track of one kind for one transport session.
#[async_trait::async_trait]
pub trait TrackSender: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Id of the track currently transmitted, if any.
    fn track_id(&self) -> Option<String>;

    /// Swap the outbound track without renegotiation.
    async fn replace_track(&self, track: Option<TrackHandle>) -> CastlineResult<()>;

    /// Whether `parameters`/`set_parameters` are usable on this host.
    fn supports_parameters(&self) -> bool;

    async fn parameters(&self) -> CastlineResult<SendParameters>;

    async fn set_parameters(&self, parameters: SendParameters) -> CastlineResult<()>;
}

/// Owned by the transport layer; maps a session and kind to its sender.
pub trait TrackSenderRegistry: Send + Sync {
    fn lookup(&self, session_id: &str, kind: TrackKind) -> Option<Arc<dyn TrackSender>>;
}
