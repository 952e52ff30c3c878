//! Wire events for the per-session real-time channel.
//!
//! Frames are JSON objects of the form `{"event": <name>, "data": {...}}`.
//! Event names are fixed by the processing service; outbound names use the
//! service's camelCase convention, inbound names arrive mixed-case as the
//! service emits them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use rangelink_core::model::{Round, RoundId, SessionId};
use rangelink_core::{Error, Result};

/// Events this device sends to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Announce the session to anyone waiting to join.
    StartSession { session_id: SessionId },
    /// The session is over; the service releases the room.
    SessionEnd { session_id: SessionId },
    /// A recording window opened; the service creates a round and
    /// rebroadcasts with the round payload.
    RecordingStarted { session_id: SessionId },
    /// The recording window closed.
    RecordingStopped { session_id: SessionId },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartSession { .. } => "startSession",
            Self::SessionEnd { .. } => "sessionEnd",
            Self::RecordingStarted { .. } => "recordingStarted",
            Self::RecordingStopped { .. } => "recordingStopped",
        }
    }

    /// Serialize to a wire frame.
    pub fn to_frame(&self) -> String {
        let session_id = match self {
            Self::StartSession { session_id }
            | Self::SessionEnd { session_id }
            | Self::RecordingStarted { session_id }
            | Self::RecordingStopped { session_id } => session_id,
        };
        json!({
            "event": self.name(),
            "data": { "sessionId": session_id },
        })
        .to_string()
    }
}

/// Server-side progress payload for one round's upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadingStatus {
    #[serde(rename = "roundId")]
    pub round_id: RoundId,
    pub progress: u8,
}

/// Events the service pushes to this device.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The service created a round for the recording we announced.
    RecordingStarted { round: Round },
    /// Full authoritative presence set after a device joined.
    ParticipantJoin { users: HashMap<String, String> },
    /// Full authoritative presence set after a device left.
    ParticipantLeave { users: HashMap<String, String> },
    /// Server-side transcoding progress for an uploaded recording.
    UploadProgress { status: UploadingStatus },
    /// Server-side processing finished for a round.
    UploadDone { round_id: RoundId },
    /// The service ended the session.
    SessionEnded,
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecordingStarted { .. } => "recordingStarted",
            Self::ParticipantJoin { .. } => "participant_join",
            Self::ParticipantLeave { .. } => "participant_leave",
            Self::UploadProgress { .. } => "targetVideoUploadProgress",
            Self::UploadDone { .. } => "targetVideoUploadDone",
            Self::SessionEnded => "session_ended",
        }
    }

    /// Parse a wire frame. Unknown event names are not an error; they
    /// return `None` so the channel can skip them.
    pub fn from_frame(frame: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(frame)?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Channel("frame missing event name".to_string()))?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let parsed = match event {
            "recordingStarted" => {
                let round = data
                    .get("round_data")
                    .cloned()
                    .ok_or_else(|| Error::Channel("recordingStarted missing round_data".to_string()))?;
                Some(Self::RecordingStarted {
                    round: serde_json::from_value(round)?,
                })
            }
            "participant_join" => Some(Self::ParticipantJoin {
                users: parse_users(&data)?,
            }),
            "participant_leave" => Some(Self::ParticipantLeave {
                users: parse_users(&data)?,
            }),
            "targetVideoUploadProgress" => {
                let status = data.get("uploading_status").cloned().ok_or_else(|| {
                    Error::Channel("progress frame missing uploading_status".to_string())
                })?;
                Some(Self::UploadProgress {
                    status: serde_json::from_value(status)?,
                })
            }
            "targetVideoUploadDone" => {
                let round_id = data
                    .get("round_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Channel("done frame missing round_id".to_string()))?;
                Some(Self::UploadDone {
                    round_id: round_id.to_string(),
                })
            }
            "session_ended" => Some(Self::SessionEnded),
            other => {
                debug!(event = other, "ignoring unknown channel event");
                None
            }
        };
        Ok(parsed)
    }
}

fn parse_users(data: &Value) -> Result<HashMap<String, String>> {
    let users = data
        .get("users")
        .cloned()
        .ok_or_else(|| Error::Channel("presence frame missing users".to_string()))?;
    Ok(serde_json::from_value(users)?)
}
