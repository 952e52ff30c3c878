use std::collections::HashSet;

use tracing::debug;

use crate::signaling::{IceCandidate, SessionDescription};

/// Lifecycle of one peer connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

/// What to do with an inbound remote candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateAdmission {
    /// Apply to the endpoint now.
    Apply,
    /// Held until the remote description is set; flushed via
    /// [`PeerLink::take_queued`].
    Queued,
    /// Already seen or the link is closed; do nothing.
    Dropped,
}

/// Negotiation-state mirror for one link.
///
/// Tracks descriptions, admitted candidates, and connection state without
/// owning any network resources. Candidates arriving before the remote
/// description are queued and flushed after the answer is applied, rather
/// than applied eagerly; duplicates are dropped so re-delivery from the
/// signaling store is harmless.
#[derive(Debug)]
pub struct PeerLink {
    state: LinkState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    pending_remote: Vec<IceCandidate>,
    seen: HashSet<IceCandidate>,
}

impl Default for PeerLink {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerLink {
    pub fn new() -> Self {
        Self {
            state: LinkState::New,
            local: None,
            remote: None,
            pending_remote: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state == LinkState::Closed
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn set_local(&mut self, desc: SessionDescription) {
        self.local = Some(desc);
        if self.state == LinkState::New {
            self.state = LinkState::Connecting;
        }
    }

    /// Record the remote answer. Returns false if a remote description is
    /// already set; the store may deliver the answer more than once but
    /// only the first applies.
    pub fn try_set_remote(&mut self, desc: SessionDescription) -> bool {
        if self.remote.is_some() || self.is_closed() {
            return false;
        }
        self.remote = Some(desc);
        true
    }

    /// Decide what to do with an inbound remote candidate.
    pub fn admit_candidate(&mut self, candidate: &IceCandidate) -> CandidateAdmission {
        if self.is_closed() {
            return CandidateAdmission::Dropped;
        }
        if !self.seen.insert(candidate.clone()) {
            debug!("duplicate candidate dropped");
            return CandidateAdmission::Dropped;
        }
        if self.remote.is_some() {
            CandidateAdmission::Apply
        } else {
            self.pending_remote.push(candidate.clone());
            CandidateAdmission::Queued
        }
    }

    /// Candidates queued before the remote description was set, in arrival
    /// order. Emptied by the call.
    pub fn take_queued(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.pending_remote)
    }

    /// Fold in a state change from the endpoint. Closed is terminal.
    pub fn on_state(&mut self, state: LinkState) {
        if self.state != LinkState::Closed {
            self.state = state;
        }
    }

    /// Mark the link closed. Idempotent.
    pub fn close(&mut self) {
        self.state = LinkState::Closed;
        self.pending_remote.clear();
    }
}
