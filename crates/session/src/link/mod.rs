//! Peer-to-peer media link.
//!
//! [`PeerLink`] mirrors the negotiation state of the underlying connection
//! so decisions (apply vs queue a candidate, accept vs ignore an answer)
//! stay testable without a network. [`MediaEndpoint`] is the seam to the
//! actual WebRTC stack; [`PeerLinkManager`] drives one endpoint per
//! negotiation attempt and rebuilds it whenever the renegotiation counter
//! advances.

mod manager;
mod peer;
mod rtc;

pub use manager::{LinkEvent, PeerLinkManager};
pub use peer::{CandidateAdmission, LinkState, PeerLink};
pub use rtc::RtcEndpointFactory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use rangelink_core::config::LinkConfig;
use rangelink_core::Result;

use crate::signaling::{IceCandidate, SessionDescription};

/// Connection-level notifications from a media endpoint.
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// The local ICE agent gathered a candidate to relay to the peer.
    LocalCandidate(IceCandidate),
    /// The underlying connection changed state.
    StateChanged(LinkState),
    /// The remote device's media track arrived; the capture surface shows
    /// it as the target feed.
    RemoteTrack { kind: String },
}

/// One peer connection attempt.
#[async_trait]
pub trait MediaEndpoint: Send + Sync {
    /// Create the local offer and set it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Apply the remote answer.
    async fn apply_answer(&self, answer: &SessionDescription) -> Result<()>;

    /// Apply one remote candidate.
    async fn apply_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Write one encoded media sample onto the local outgoing track.
    async fn send_media(&self, data: Bytes, duration: Duration) -> Result<()>;

    /// Close the connection. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Builds endpoints; swapped for a mock in tests.
#[async_trait]
pub trait MediaEndpointFactory: Send + Sync {
    async fn create(
        &self,
        config: &LinkConfig,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn MediaEndpoint>>;
}
