//! Local preview surface.

use crate::track::MediaStream;

/// The on-screen element showing the local stream.
pub trait PreviewSurface: Send + Sync {
    /// Show `stream`, or clear the preview with `None`.
    fn attach(&self, stream: Option<&MediaStream>);
}
