//! Error types shared across Castline crates.

use serde::{Deserialize, Serialize};

/// Top-level error type for Castline operations.
#[derive(Debug, thiserror::Error)]
pub enum CastlineError {
    /// A required platform feature is absent. Fatal for that operation only.
    #[error("Capability unsupported: {message}")]
    CapabilityUnsupported { message: String },

    #[error("Device not found: {message}")]
    DeviceNotFound { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The operation needs a bound track or transport session that does not exist.
    #[error("No active session: {message}")]
    NoActiveSession { message: String },

    #[error("Sender does not support encoding parameter changes")]
    SenderCapabilityMissing,

    #[error("Acquisition error: {message}")]
    Acquisition { message: String },

    #[error("Sender error: {message}")]
    Sender { message: String },

    #[error("Gain handle belongs to a discarded audio graph (generation {generation})")]
    StaleGainHandle { generation: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CastlineError.
pub type CastlineResult<T> = Result<T, CastlineError>;

/// Serializable error classification carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CapabilityUnsupported,
    DeviceNotFound,
    PermissionDenied,
    NoActiveSession,
    SenderCapabilityMissing,
    Acquisition,
    Sender,
    StaleGainHandle,
    Config,
    Internal,
}

impl CastlineError {
    pub fn capability_unsupported(msg: impl Into<String>) -> Self {
        Self::CapabilityUnsupported {
            message: msg.into(),
        }
    }

    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            message: msg.into(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn no_active_session(msg: impl Into<String>) -> Self {
        Self::NoActiveSession {
            message: msg.into(),
        }
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn sender(msg: impl Into<String>) -> Self {
        Self::Sender {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Classification used when re-signaling this error as an event.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityUnsupported { .. } => ErrorKind::CapabilityUnsupported,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NoActiveSession { .. } => ErrorKind::NoActiveSession,
            Self::SenderCapabilityMissing => ErrorKind::SenderCapabilityMissing,
            Self::Acquisition { .. } => ErrorKind::Acquisition,
            Self::Sender { .. } => ErrorKind::Sender,
            Self::StaleGainHandle { .. } => ErrorKind::StaleGainHandle,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable detail, if the variant carries one.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::CapabilityUnsupported { message }
            | Self::DeviceNotFound { message }
            | Self::PermissionDenied { message }
            | Self::NoActiveSession { message }
            | Self::Acquisition { message }
            | Self::Sender { message }
            | Self::Config { message } => Some(message.clone()),
            Self::SenderCapabilityMissing | Self::StaleGainHandle { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            CastlineError::permission_denied("display").kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            CastlineError::SenderCapabilityMissing.kind(),
            ErrorKind::SenderCapabilityMissing
        );
        let io = CastlineError::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), ErrorKind::Internal);
    }

    #[test]
    fn message_is_optional() {
        assert_eq!(
            CastlineError::device_not_found("camera").message().as_deref(),
            Some("camera")
        );
        assert!(CastlineError::SenderCapabilityMissing.message().is_none());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NoActiveSession).unwrap();
        assert_eq!(json, "\"no_active_session\"");
    }
}
