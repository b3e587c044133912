//! Castline Media Model
//!
//! Defines the data contracts shared by the stream engine, the platform
//! boundary, and tools:
//! - **Tracks:** track kind, source, and camera facing
//! - **Constraints:** tagged capture constraint variants and the active set
//! - **Modes:** publish topology (camera / screen / screen+camera) and audio
//!   topology (microphone / system / both)
//! - **Config:** the immutable stream configuration handed to every component
//! - **Events:** asynchronous notifications raised by the engine

pub mod config;
pub mod constraints;
pub mod device;
pub mod event;
pub mod mode;
pub mod track;

pub use config::*;
pub use constraints::*;
pub use device::*;
pub use event::*;
pub use mode::*;
pub use track::*;
