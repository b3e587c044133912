//! CLI configuration file.

use castline_common::config::LoggingConfig;
use castline_media_model::StreamConfig;
use serde::{Deserialize, Serialize};

/// Contents of `config.json`. Missing sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use castline_media_model::{CameraLocation, PublishMode};

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: CliConfig = serde_json::from_str(
            r#"{"stream":{"publish_mode":"screen","camera_location":"top"}}"#,
        )
        .unwrap();
        assert_eq!(config.stream.publish_mode, PublishMode::Screen);
        assert_eq!(config.stream.camera_location, CameraLocation::Top);
        assert_eq!(config.stream.keepalive_interval_ms, 3000);
        assert_eq!(config.logging.level, "info");
    }
}
