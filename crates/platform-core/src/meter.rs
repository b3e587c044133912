//! Instantaneous sound level metering.

use castline_common::error::CastlineResult;

use crate::track::MediaStream;

/// Host level meter. The measurement itself is the host's business.
#[async_trait::async_trait]
pub trait SoundLevelMeter: Send + Sync {
    async fn connect(&self, stream: &MediaStream) -> CastlineResult<()>;

    /// Latest level in `[0, 1]`.
    fn instant(&self) -> f64;

    fn disconnect(&self);
}
