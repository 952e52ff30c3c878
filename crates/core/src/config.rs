//! Orchestrator configuration
//!
//! Defaults mirror the deployed capture setup: 0.6 keypoint confidence,
//! 5.5 s visible countdown before a recording starts, a 5 s pre-roll window
//! cut into 1 s chunks, and a 960×720 @ 30 fps environment-facing camera.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gesture trigger tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Minimum keypoint confidence for an observation to count
    pub confidence_threshold: f32,
    /// Delay between arming and recording start, in milliseconds
    pub countdown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            countdown_ms: 5_500,
        }
    }
}

impl GestureConfig {
    /// Countdown delay as a Duration
    pub fn countdown(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }
}

/// Rolling pre-roll buffer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Wall-clock capacity of the pre-roll buffer, in milliseconds
    pub buffer_window_ms: u64,
    /// Cadence at which the capture source emits chunks, in milliseconds
    pub chunk_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_window_ms: 5_000,
            chunk_interval_ms: 1_000,
        }
    }
}

impl RecorderConfig {
    /// Buffer capacity as a Duration
    pub fn buffer_window(&self) -> Duration {
        Duration::from_millis(self.buffer_window_ms)
    }

    /// Chunk cadence as a Duration
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

/// Camera acquisition hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Ideal frame width
    pub width: u32,
    /// Ideal frame height
    pub height: u32,
    /// Ideal frame rate
    pub frame_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 720,
            frame_rate: 30,
        }
    }
}

/// Peer link tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// ICE server URLs (STUN/TURN)
    pub ice_servers: Vec<String>,
    /// Bound on the offer/answer exchange, in milliseconds
    pub negotiation_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            negotiation_timeout_ms: 20_000,
        }
    }
}

impl LinkConfig {
    /// Negotiation bound as a Duration
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}

/// Processing service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the processing service
    pub base_url: String,
    /// Bearer token for authenticated endpoints
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            auth_token: None,
        }
    }
}

/// Complete orchestrator configuration for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Gesture trigger tuning
    #[serde(default)]
    pub gesture: GestureConfig,
    /// Rolling buffer tuning
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Camera hints
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Peer link tuning
    #[serde(default)]
    pub link: LinkConfig,
    /// Processing service endpoints
    #[serde(default)]
    pub upload: UploadConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file, filling defaults for anything
    /// the file leaves out
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.gesture.confidence_threshold, 0.6);
        assert_eq!(config.gesture.countdown(), Duration::from_millis(5_500));
        assert_eq!(config.recorder.buffer_window(), Duration::from_secs(5));
        assert_eq!(config.recorder.chunk_interval(), Duration::from_secs(1));
        assert_eq!(config.link.negotiation_timeout(), Duration::from_secs(20));
        assert_eq!(config.capture.width, 960);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[gesture]\ncountdown_ms = 3000\nconfidence_threshold = 0.5\n\n[upload]\nbase_url = \"https://range.example/api\"\n"
        )
        .unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gesture.countdown_ms, 3_000);
        assert_eq!(config.upload.base_url, "https://range.example/api");
        // untouched sections keep defaults
        assert_eq!(config.recorder.buffer_window_ms, 5_000);
        assert_eq!(config.link.ice_servers.len(), 1);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [[[").unwrap();
        assert!(matches!(
            SessionConfig::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
