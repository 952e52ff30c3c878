//! Error types for the RangeLink capture orchestrator

use thiserror::Error;

/// Result type alias for RangeLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the capture orchestrator
///
/// Every variant maps to a degraded-but-alive state: media and signaling
/// failures leave the session inert (no link, no recording), upload failures
/// are surfaced to the caller, and processing failures are recoverable via an
/// explicit retry. Nothing here is expected to take the host process down.
#[derive(Debug, Error)]
pub enum Error {
    /// The signaling rendezvous store is unreachable
    #[error("Signaling unavailable: {0}")]
    SignalingUnavailable(String),

    /// Camera/microphone acquisition was denied or the device is absent
    #[error("Media acquisition failed: {0}")]
    MediaAcquisitionFailed(String),

    /// The peer link offer/answer exchange failed or timed out
    #[error("Link negotiation failed: {0}")]
    LinkNegotiationFailed(String),

    /// Submitting a finalized recording to the processing service failed
    #[error("Upload failed for round {round_id}: {reason}")]
    UploadFailed {
        /// Destination round identifier
        round_id: String,
        /// Failure detail
        reason: String,
    },

    /// The pose detector is not loaded; auto-trigger degrades to manual
    #[error("Pose model unavailable: {0}")]
    PoseModelUnavailable(String),

    /// Server-side round processing failed; recoverable via explicit retry
    #[error("Processing failed for round {round_id}: {reason}")]
    ProcessingFailed {
        /// Round whose processing failed
        round_id: String,
        /// Failure detail
        reason: String,
    },

    /// Real-time channel transport error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an upload failure
    pub fn upload(round_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            round_id: round_id.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a processing failure
    pub fn processing(round_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProcessingFailed {
            round_id: round_id.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure leaves the link unestablished and the session
    /// should wait for the next explicit renegotiation trigger
    pub fn is_link_fatal(&self) -> bool {
        matches!(
            self,
            Self::SignalingUnavailable(_) | Self::LinkNegotiationFailed(_)
        )
    }
}
