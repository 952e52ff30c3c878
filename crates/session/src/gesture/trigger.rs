use tracing::debug;

use rangelink_core::config::GestureConfig;

use super::PoseFrame;

/// Trigger lifecycle. At most one delayed-start timer is outstanding at a
/// time; arming a new one always supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// No gesture pending.
    Idle,
    /// Right hand seen overhead but the peer link is not connected yet.
    /// Promoted to `Countdown` when the link comes up, otherwise the
    /// delayed-start timer fires into nothing and we fall back to `Idle`.
    StartArmed,
    /// Right hand seen overhead with the link connected; the delayed-start
    /// timer is running.
    Countdown,
    /// A recording window is open.
    Recording,
    /// Left hand seen overhead; the next evaluation stops or cancels.
    EndArmed,
}

/// What the session loop should do in response to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Start (or restart) the delayed-start timer.
    ArmCountdown,
    /// Cancel any outstanding delayed-start timer.
    CancelCountdown,
    /// Open a recording window now.
    StartRecording,
    /// Close the recording window and finalize.
    StopRecording,
}

/// Five-state machine mapping pose observations and timer expiry to
/// recording intents.
///
/// The machine itself holds no timers; the owner arms a delay when it sees
/// [`TriggerAction::ArmCountdown`] and reports expiry back through
/// [`GestureTrigger::countdown_elapsed`]. Expiry is only honored if the
/// preconditions still hold at fire time, so a cancelled countdown whose
/// timer races the cancellation cannot start a recording.
#[derive(Debug)]
pub struct GestureTrigger {
    state: TriggerState,
    threshold: f32,
}

impl GestureTrigger {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            state: TriggerState::Idle,
            threshold: config.confidence_threshold,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == TriggerState::Recording
    }

    /// Feed one pose frame. `connected` is the current peer link state.
    pub fn observe(&mut self, frame: &PoseFrame, connected: bool) -> Option<TriggerAction> {
        // While recording only the end-arm gesture is evaluated, so a hand
        // raised to steady aim cannot re-trigger a start.
        if self.state == TriggerState::Recording {
            if frame.left_hand_overhead(self.threshold) {
                if connected {
                    debug!("left hand overhead while recording, stopping");
                    self.state = TriggerState::Idle;
                    return Some(TriggerAction::StopRecording);
                }
                self.state = TriggerState::EndArmed;
            }
            return None;
        }

        if frame.left_hand_overhead(self.threshold) {
            match self.state {
                TriggerState::StartArmed | TriggerState::Countdown => {
                    debug!("left hand overhead, cancelling pending start");
                    self.state = TriggerState::EndArmed;
                    return Some(TriggerAction::CancelCountdown);
                }
                // Left hand while idle is ignored: no stop without a start.
                _ => return None,
            }
        }

        if frame.right_hand_overhead(self.threshold) {
            match self.state {
                TriggerState::Idle | TriggerState::EndArmed => {
                    debug!(connected, "right hand overhead, arming countdown");
                    self.state = if connected {
                        TriggerState::Countdown
                    } else {
                        TriggerState::StartArmed
                    };
                    return Some(TriggerAction::ArmCountdown);
                }
                _ => return None,
            }
        }

        None
    }

    /// The delayed-start timer fired. Starts recording only if the link is
    /// still connected and no cancel or end-arm intervened; otherwise the
    /// pending start decays to idle.
    pub fn countdown_elapsed(&mut self, connected: bool) -> Option<TriggerAction> {
        match self.state {
            TriggerState::Countdown if connected => {
                self.state = TriggerState::Recording;
                Some(TriggerAction::StartRecording)
            }
            TriggerState::Countdown | TriggerState::StartArmed => {
                debug!("countdown elapsed without a connected link, decaying to idle");
                self.state = TriggerState::Idle;
                None
            }
            _ => None,
        }
    }

    /// The peer link came up. A start armed while disconnected is promoted
    /// to a live countdown; the timer is already running, so no action.
    pub fn link_connected(&mut self) {
        if self.state == TriggerState::StartArmed {
            self.state = TriggerState::Countdown;
        }
    }

    /// The peer link dropped. Any pending start is cancelled. A recording
    /// in progress is left to the presence monitor, which decides whether
    /// to force-stop.
    pub fn link_disconnected(&mut self) -> Option<TriggerAction> {
        match self.state {
            TriggerState::StartArmed | TriggerState::Countdown => {
                self.state = TriggerState::Idle;
                Some(TriggerAction::CancelCountdown)
            }
            TriggerState::EndArmed => {
                self.state = TriggerState::Idle;
                None
            }
            _ => None,
        }
    }

    /// Explicit user start, bypassing gesture detection and the countdown.
    pub fn manual_start(&mut self, connected: bool) -> Option<TriggerAction> {
        if connected && self.state != TriggerState::Recording {
            self.state = TriggerState::Recording;
            Some(TriggerAction::StartRecording)
        } else {
            None
        }
    }

    /// Explicit user stop.
    pub fn manual_stop(&mut self) -> Option<TriggerAction> {
        if self.state == TriggerState::Recording {
            self.state = TriggerState::Idle;
            Some(TriggerAction::StopRecording)
        } else {
            None
        }
    }

    /// Unconditional reset, used when the remote device leaves the session.
    /// Stops an open recording and drops any pending start.
    pub fn force_stop(&mut self) -> Option<TriggerAction> {
        let action = match self.state {
            TriggerState::Recording => Some(TriggerAction::StopRecording),
            TriggerState::StartArmed | TriggerState::Countdown => {
                Some(TriggerAction::CancelCountdown)
            }
            _ => None,
        };
        self.state = TriggerState::Idle;
        action
    }
}
