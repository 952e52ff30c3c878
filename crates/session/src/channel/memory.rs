//! In-process channel for tests and local wiring.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rangelink_core::Result;

use super::{ChannelSink, InboundEvent, OutboundEvent};

/// Paired in-memory channel: a [`MemorySink`] that records outbound events
/// and a [`MemoryRemote`] the test drives to inject inbound ones.
pub struct MemoryChannel;

impl MemoryChannel {
    /// Build the sink, the inbound receiver for the session loop, and the
    /// remote handle for the test side.
    pub fn pair() -> (MemorySink, mpsc::UnboundedReceiver<InboundEvent>, MemoryRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            MemorySink { sent: sent.clone() },
            rx,
            MemoryRemote { tx, sent },
        )
    }
}

/// Records every outbound event.
#[derive(Clone)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl MemorySink {
    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChannelSink for MemorySink {
    async fn send(&self, event: OutboundEvent) -> Result<()> {
        self.sent.lock().push(event);
        Ok(())
    }
}

/// Test-side handle: inject inbound events and inspect what was sent.
#[derive(Clone)]
pub struct MemoryRemote {
    tx: mpsc::UnboundedSender<InboundEvent>,
    sent: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl MemoryRemote {
    /// Push an inbound event toward the session loop.
    pub fn push(&self, event: InboundEvent) {
        // The session dropping its receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbound_events_are_recorded() {
        let (sink, _rx, remote) = MemoryChannel::pair();
        sink.send(OutboundEvent::StartSession {
            session_id: "s1".to_string(),
        })
        .await
        .unwrap();
        assert_eq!(remote.sent().len(), 1);
        assert_eq!(remote.sent()[0].name(), "startSession");
    }

    #[tokio::test]
    async fn inbound_events_reach_the_receiver() {
        let (_sink, mut rx, remote) = MemoryChannel::pair();
        remote.push(InboundEvent::SessionEnded);
        assert_eq!(rx.recv().await, Some(InboundEvent::SessionEnded));
    }

    #[tokio::test]
    async fn push_after_receiver_drop_is_harmless() {
        let (_sink, rx, remote) = MemoryChannel::pair();
        drop(rx);
        remote.push(InboundEvent::SessionEnded);
    }
}
