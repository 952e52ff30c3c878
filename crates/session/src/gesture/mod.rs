//! Pose-driven recording triggers.
//!
//! A pose estimator (outside this crate) emits one [`PoseFrame`] per video
//! frame. The [`GestureTrigger`] state machine turns those frames into
//! start/stop intents for the rolling recorder.

mod trigger;

pub use trigger::{GestureTrigger, TriggerAction, TriggerState};

/// Well-known keypoint names produced by MoveNet-style pose models.
pub const KEYPOINT_NOSE: &str = "nose";
pub const KEYPOINT_LEFT_WRIST: &str = "left_wrist";
pub const KEYPOINT_RIGHT_WRIST: &str = "right_wrist";

/// A single named keypoint with normalized image coordinates and a
/// detector confidence score in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, score: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            score,
        }
    }
}

/// One frame's worth of keypoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseFrame {
    pub keypoints: Vec<Keypoint>,
}

impl PoseFrame {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn find(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.name == name)
    }

    /// A hand is overhead when both the hand and head keypoints are
    /// confidently observed and the hand sits above the head on screen
    /// (smaller y = higher).
    pub fn hand_overhead(&self, hand: &str, threshold: f32) -> bool {
        let (Some(wrist), Some(head)) = (self.find(hand), self.find(KEYPOINT_NOSE)) else {
            return false;
        };
        wrist.score > threshold && head.score > threshold && wrist.y < head.y
    }

    pub fn right_hand_overhead(&self, threshold: f32) -> bool {
        self.hand_overhead(KEYPOINT_RIGHT_WRIST, threshold)
    }

    pub fn left_hand_overhead(&self, threshold: f32) -> bool {
        self.hand_overhead(KEYPOINT_LEFT_WRIST, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(head_y: f32, right_y: f32, right_score: f32) -> PoseFrame {
        PoseFrame::new(vec![
            Keypoint::new(KEYPOINT_NOSE, 0.5, head_y, 0.9),
            Keypoint::new(KEYPOINT_RIGHT_WRIST, 0.7, right_y, right_score),
        ])
    }

    #[test]
    fn hand_above_head_with_confidence_is_overhead() {
        assert!(frame(0.3, 0.1, 0.9).right_hand_overhead(0.6));
    }

    #[test]
    fn hand_below_head_is_not_overhead() {
        assert!(!frame(0.3, 0.5, 0.9).right_hand_overhead(0.6));
    }

    #[test]
    fn low_confidence_hand_is_not_overhead() {
        assert!(!frame(0.3, 0.1, 0.4).right_hand_overhead(0.6));
    }

    #[test]
    fn missing_keypoints_are_not_overhead() {
        let empty = PoseFrame::default();
        assert!(!empty.right_hand_overhead(0.6));
        assert!(!empty.left_hand_overhead(0.6));
    }
}
