//! Event subscription channel for asynchronous notifications.

use castline_common::error::CastlineError;
use castline_media_model::EngineEvent;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Fan-out of [`EngineEvent`]s. Cheap to clone; all clones share subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Nobody listening is fine.
    pub fn emit(&self, event: EngineEvent) {
        tracing::debug!(?event, "Engine event");
        let _ = self.sender.send(event);
    }

    /// Re-signal `error` as a named error event.
    pub fn emit_error(&self, error: &CastlineError) {
        self.emit(EngineEvent::from(error));
    }
}
