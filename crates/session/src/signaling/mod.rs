//! Signaling exchange for peer link negotiation
//!
//! Carries offers, answers, and ICE candidates between exactly two devices
//! that have no direct network path, through a shared keyed document store
//! addressed by session identifier. One document per session holds the
//! `offer`/`answer` fields plus two append-only candidate collections, one
//! per link role.
//!
//! The store backend is pluggable behind [`SignalingStore`]; the in-memory
//! implementation backs tests and single-process demos.

pub mod memory;

pub use memory::MemorySignalingStore;

use async_trait::async_trait;
use rangelink_core::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Which side of the handshake a description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Created by the initiating device
    Offer,
    /// Created by the joining device
    Answer,
}

/// A session description exchanged through the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// Raw SDP payload
    pub sdp: String,
}

impl SessionDescription {
    /// Build an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Build an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One network-path candidate, as relayed through the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line
    pub candidate: String,
    /// Media stream identification tag
    #[serde(default, rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    /// Media line index
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Role of a device on the peer link
///
/// The initiating (posture) device is the caller; the joining (target)
/// device is the callee. Each role appends into its own collection and
/// subscribes to the counter-role's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// Initiating device
    Caller,
    /// Joining device
    Callee,
}

impl LinkRole {
    /// Name of the candidate collection this role appends into
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Caller => "callerCandidates",
            Self::Callee => "calleeCandidates",
        }
    }

    /// The other side of the link
    pub fn counter(&self) -> Self {
        match self {
            Self::Caller => Self::Callee,
            Self::Callee => Self::Caller,
        }
    }
}

/// Shared rendezvous store for connection-setup messages
///
/// All operations fail with `SignalingUnavailable` when the store cannot be
/// reached; the link manager treats that as "link not established" and
/// retries only on the next explicit renegotiation trigger, never in a tight
/// loop.
#[async_trait]
pub trait SignalingStore: Send + Sync {
    /// Idempotent upsert of the offer under the session's document
    async fn publish_offer(&self, session_id: &str, offer: &SessionDescription) -> Result<()>;

    /// Idempotent upsert of the answer (joining device side)
    async fn publish_answer(&self, session_id: &str, answer: &SessionDescription) -> Result<()>;

    /// Read the current offer, if any (joining device side)
    async fn fetch_offer(&self, session_id: &str) -> Result<Option<SessionDescription>>;

    /// Subscribe to document changes carrying an answer
    ///
    /// May deliver the same answer more than once; the consumer applies at
    /// most one meaningfully, guarded by its own "remote description not yet
    /// set" check.
    async fn subscribe_answer(
        &self,
        session_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<SessionDescription>>;

    /// Append a candidate to the role-scoped collection
    async fn publish_candidate(
        &self,
        session_id: &str,
        role: LinkRole,
        candidate: &IceCandidate,
    ) -> Result<()>;

    /// Subscribe to a role's candidate collection
    ///
    /// Replays every existing candidate on first subscribe, then fires once
    /// per newly appended one. Duplicate delivery is allowed; consumers must
    /// apply candidates idempotently.
    async fn subscribe_candidates(
        &self,
        session_id: &str,
        role: LinkRole,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>>;

    /// Wipe both role-scoped candidate collections
    ///
    /// Called by the initiating device before each fresh negotiation so
    /// stale candidates from a previous attempt are not replayed into the
    /// new link.
    async fn clear_candidates(&self, session_id: &str) -> Result<()>;
}
