//! Session data model
//!
//! Types shared between the orchestrator and the external session API.
//! Sessions are created by the session API before the orchestrator activates;
//! the orchestrator only reads them and extends them through round events.
//! Rounds are created when the server accepts a recording start and are
//! mutated by upload progress/completion signals. The orchestrator never
//! deletes either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session identifier as issued by the session API
pub type SessionId = String;

/// Round identifier as issued by the session API
pub type RoundId = String;

/// Processing status of one video source within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Recording accepted, processing not yet started
    #[default]
    Pending,
    /// Server-side processing in progress
    Processing,
    /// Processing finished successfully
    Success,
    /// Processing failed; recoverable via explicit retry
    Failure,
}

impl RoundStatus {
    /// True for Success or Failure
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// One recorded take within a training session
///
/// The two video sources (posture camera, target camera) carry independent
/// processing status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Round identifier
    #[serde(rename = "_id")]
    pub id: RoundId,
    /// Owning session
    pub session_id: SessionId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Posture-video processing status
    #[serde(default)]
    pub pose_status: RoundStatus,
    /// Target-video processing status
    #[serde(default)]
    pub target_status: RoundStatus,
    /// Reference to the uploaded posture video, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_video: Option<String>,
    /// Reference to the uploaded target video, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_video: Option<String>,
    /// Server-side error detail for the posture source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_error_message: Option<String>,
    /// Server-side error detail for the target source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error_message: Option<String>,
}

impl Round {
    /// Create a fresh round in the pending state
    pub fn new(id: impl Into<RoundId>, session_id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            pose_status: RoundStatus::Pending,
            target_status: RoundStatus::Pending,
            pose_video: None,
            target_video: None,
            pose_error_message: None,
            target_error_message: None,
        }
    }
}

/// A live training session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    #[serde(rename = "_id")]
    pub id: SessionId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Completed rounds, oldest first
    #[serde(default)]
    pub round_result: Vec<Round>,
    /// Overall processing status reported by the session API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<String>,
}

impl Session {
    /// Create a session shell for the given identifier
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            round_result: Vec::new(),
            processing_status: None,
        }
    }

    /// Create a session with a freshly generated identifier
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// One upload in flight: a finalized recording bound to a round
///
/// Progress is observed from out-of-band channel events, never derived from
/// the upload call itself; the session sees it as monotonic non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    /// Destination round
    pub round_id: RoundId,
    /// Round-relative recording start timestamp (Unix millis)
    pub started_at_ms: i64,
    /// Last observed progress percentage, 0..=100
    pub progress: u8,
    /// Terminal result, once observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<UploadResult>,
}

/// Terminal outcome of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadResult {
    /// Upload and server-side receipt completed
    Done,
    /// Upload failed; surfaced to the user, not retried automatically
    Failed,
}

impl UploadTask {
    /// Create a task at zero progress
    pub fn new(round_id: impl Into<RoundId>, started_at_ms: i64) -> Self {
        Self {
            round_id: round_id.into(),
            started_at_ms,
            progress: 0,
            result: None,
        }
    }

    /// Apply a progress observation, keeping the visible value monotonic
    /// and ignoring anything after a terminal result
    pub fn observe_progress(&mut self, pct: u8) {
        if self.result.is_some() {
            return;
        }
        self.progress = self.progress.max(pct.min(100));
    }

    /// Mark the task done; later observations are ignored
    pub fn complete(&mut self) {
        if self.result.is_none() {
            self.progress = 100;
            self.result = Some(UploadResult::Done);
        }
    }
}

/// Devices currently attached to a session
///
/// Maps device connection identifier to a role label ("pose_camera" /
/// "target_camera"). The server is authoritative for the full set: join and
/// leave notifications replace it wholesale rather than applying deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PresenceSet {
    /// Connection id → role label
    pub users: HashMap<String, String>,
}

impl PresenceSet {
    /// Replace the whole set with the server's view
    pub fn replace(&mut self, users: HashMap<String, String>) {
        self.users = users;
    }

    /// True if any attached device carries the given role label
    pub fn has_role(&self, role: &str) -> bool {
        self.users.values().any(|r| r == role)
    }

    /// Number of attached devices
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if no device is attached
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Role label for the mobile target camera
pub const ROLE_TARGET_CAMERA: &str = "target_camera";
/// Role label for the fixed posture camera
pub const ROLE_POSE_CAMERA: &str = "pose_camera";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&RoundStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::from_str::<RoundStatus>("\"FAILURE\"").unwrap(),
            RoundStatus::Failure
        );
    }

    #[test]
    fn test_round_id_field_rename() {
        let round = Round::new("abc123", "sess1");
        let json = serde_json::to_value(&round).unwrap();
        assert_eq!(json["_id"], "abc123");
        assert_eq!(json["pose_status"], "PENDING");
    }

    #[test]
    fn test_round_roundtrip_preserves_equality() {
        let round = Round::new("abc123", "sess1");
        let json = serde_json::to_string(&round).unwrap();
        let back: Round = serde_json::from_str(&json).unwrap();
        assert_eq!(back, round);
    }

    #[test]
    fn test_upload_progress_monotonic() {
        let mut task = UploadTask::new("r1", 0);
        task.observe_progress(40);
        task.observe_progress(20);
        assert_eq!(task.progress, 40);
        task.observe_progress(90);
        assert_eq!(task.progress, 90);
    }

    #[test]
    fn test_upload_progress_after_done_ignored() {
        let mut task = UploadTask::new("r1", 0);
        task.observe_progress(50);
        task.complete();
        assert_eq!(task.progress, 100);
        task.observe_progress(10);
        assert_eq!(task.progress, 100);
        assert_eq!(task.result, Some(UploadResult::Done));
    }

    #[test]
    fn test_generated_session_ids_are_unique() {
        let a = Session::generate();
        let b = Session::generate();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn test_presence_replace_wholesale() {
        let mut presence = PresenceSet::default();
        presence.replace(HashMap::from([
            ("c1".to_string(), ROLE_POSE_CAMERA.to_string()),
            ("c2".to_string(), ROLE_TARGET_CAMERA.to_string()),
        ]));
        assert!(presence.has_role(ROLE_TARGET_CAMERA));

        presence.replace(HashMap::from([(
            "c1".to_string(),
            ROLE_POSE_CAMERA.to_string(),
        )]));
        assert!(!presence.has_role(ROLE_TARGET_CAMERA));
        assert_eq!(presence.len(), 1);
    }
}
