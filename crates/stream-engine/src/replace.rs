//! Track replacement against the transport session.
//!
//! A replacement is all-or-nothing per track: the sender swaps first, and
//! only a successful swap mutates the local stream. The displaced track is
//! released after the new one is bound, never before.

use std::sync::Arc;

use castline_common::error::CastlineResult;
use castline_media_model::TrackKind;
use castline_platform_core::{TrackHandle, TrackSender, TrackSenderRegistry};

use crate::state::StreamStateManager;

/// Extra behavior for one replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Stop the active screen capture once the new video is bound.
    pub stop_display_source: bool,
}

impl ReplaceOptions {
    pub fn stopping_display() -> Self {
        Self {
            stop_display_source: true,
        }
    }
}

/// Outcome of a successful replacement.
#[derive(Debug, Clone)]
pub struct Replaced {
    /// The track that was displaced, if it differed from the new one.
    pub previous: Option<TrackHandle>,
    /// Whether a transport sender carried the swap.
    pub via_sender: bool,
}

pub struct TrackReplacer {
    senders: Arc<dyn TrackSenderRegistry>,
}

impl TrackReplacer {
    pub fn new(senders: Arc<dyn TrackSenderRegistry>) -> Self {
        Self { senders }
    }

    /// Sender for `kind` in the state's bound session, if publishing.
    pub fn sender(
        &self,
        state: &StreamStateManager,
        kind: TrackKind,
    ) -> Option<Arc<dyn TrackSender>> {
        let session_id = state.session_id()?;
        self.senders.lookup(session_id, kind)
    }

    /// Bind `track` as the local stream's `kind` track.
    ///
    /// With a sender, the outbound track is swapped first; a sender
    /// failure is returned untouched and the local stream is left as it
    /// was. Without one, the local stream is mutated directly.
    pub async fn replace_track(
        &self,
        state: &mut StreamStateManager,
        kind: TrackKind,
        track: Option<TrackHandle>,
        options: ReplaceOptions,
    ) -> CastlineResult<Replaced> {
        let sender = self.sender(state, kind);
        let via_sender = sender.is_some();

        if let Some(sender) = sender {
            sender.replace_track(track.clone()).await.map_err(|e| {
                tracing::warn!(%kind, error = %e, "Sender rejected track replacement");
                e
            })?;
        }

        let new_id = track.as_ref().map(|t| t.id().to_string());
        let previous = state.swap_track(kind, track);

        if options.stop_display_source && kind == TrackKind::Video {
            state.stop_display_video();
        }
        state.dispose_unbound();

        tracing::debug!(
            %kind,
            track = new_id.as_deref(),
            previous = previous.as_ref().map(|t| t.id()),
            via_sender,
            "Track replaced"
        );

        Ok(Replaced {
            previous,
            via_sender,
        })
    }

    /// Unbind the `kind` track entirely.
    pub async fn remove_track(
        &self,
        state: &mut StreamStateManager,
        kind: TrackKind,
    ) -> CastlineResult<Replaced> {
        self.replace_track(state, kind, None, ReplaceOptions::default())
            .await
    }
}
