//! Session presence and liveness.
//!
//! Tracks which devices are attached to the session and detects the remote
//! camera disappearing mid-session. The monitor never touches the peer
//! link directly: it publishes a monotonically increasing renegotiation
//! counter on a watch channel, and the link manager reacts to increments
//! by rebuilding its connection from a clean slate. Single writer here,
//! single reader there.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::info;

use rangelink_core::model::PresenceSet;

/// Presence state plus the renegotiation signal.
#[derive(Debug)]
pub struct PresenceMonitor {
    set: PresenceSet,
    renegotiate: watch::Sender<u64>,
}

impl PresenceMonitor {
    /// Create a monitor and the receiving end of its renegotiation
    /// counter. The counter starts at 0 and only ever increments.
    pub fn pair() -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (
            Self {
                set: PresenceSet::default(),
                renegotiate: tx,
            },
            rx,
        )
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.set
    }

    /// A device joined. The server sends the full authoritative set, so
    /// replace rather than merge.
    pub fn on_join(&mut self, users: HashMap<String, String>) {
        info!(participants = users.len(), "participant joined");
        self.set.replace(users);
    }

    /// A device left. Replaces the set and bumps the renegotiation counter
    /// exactly once so the link manager restarts cleanly. The caller is
    /// responsible for stopping any recording in progress.
    pub fn on_leave(&mut self, users: HashMap<String, String>) {
        info!(participants = users.len(), "participant left");
        self.set.replace(users);
        self.renegotiate.send_modify(|v| *v += 1);
    }

    /// Current value of the renegotiation counter.
    pub fn renegotiation_count(&self) -> u64 {
        *self.renegotiate.borrow()
    }
}
