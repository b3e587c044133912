//! Castline Stream Engine
//!
//! Owns the local audio/video stream that feeds a real-time transport
//! session and keeps three resources consistent while any of them changes:
//! capture devices, the mixing/compositing pipeline, and the transport
//! sender.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       Coordinator                          │
//! │   publish mode · audio mode · devices · bandwidth · volume │
//! └──────┬─────────────┬──────────────┬──────────────┬─────────┘
//!        │             │              │              │
//!        ▼             ▼              ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌──────────────┐
//! │ AudioMixer │ │ Compositor │ │ Mute /     │ │ TrackReplacer│
//! │ gain graph │ │ 15 Hz draw │ │ Keepalive  │─▶ sender swap  │
//! └─────┬──────┘ └─────┬──────┘ └────────────┘ └──────┬───────┘
//!       │              │                              │
//!       ▼              ▼                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │         StreamStateManager (local stream, preview)         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Acquired media flows up through mixing or compositing into the track
//! replacer; intents flow down from the coordinator. Asynchronous
//! notifications go out on the [`EventBus`].

pub mod compositor;
pub mod coordinator;
pub mod events;
pub mod keepalive;
pub mod mixer;
pub mod replace;
pub mod state;

pub use compositor::{overlay_rect, OverlayLayout, VideoCompositor};
pub use coordinator::{Coordinator, DisplayFallback};
pub use events::EventBus;
pub use keepalive::{CameraKeepalive, MuteController};
pub use mixer::{AudioMixer, BranchRole, GainHandle};
pub use replace::{ReplaceOptions, Replaced, TrackReplacer};
pub use state::{LocalStream, StreamStateManager};
