use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rangelink_core::config::LinkConfig;
use rangelink_core::model::SessionId;
use rangelink_core::{Error, Result};

use crate::signaling::{IceCandidate, LinkRole, SessionDescription, SignalingStore};

use super::peer::{CandidateAdmission, LinkState, PeerLink};
use super::{EndpointEvent, MediaEndpoint, MediaEndpointFactory};

/// Negotiation inputs delivered to the session loop, each tagged with the
/// generation of the attempt that produced it so events from a torn-down
/// link are discarded instead of corrupting the replacement.
#[derive(Debug)]
pub enum LinkEvent {
    Answer {
        generation: u64,
        answer: SessionDescription,
    },
    RemoteCandidate {
        generation: u64,
        candidate: IceCandidate,
    },
    Endpoint {
        generation: u64,
        event: EndpointEvent,
    },
}

/// Owns the peer link for one session.
///
/// Exactly one negotiation attempt (generation) is live at a time. A
/// renegotiation tears the current attempt down, clears stale candidates
/// from the store, and runs the initiate sequence again from scratch.
pub struct PeerLinkManager {
    session_id: SessionId,
    config: LinkConfig,
    store: Arc<dyn SignalingStore>,
    factory: Arc<dyn MediaEndpointFactory>,
    events: mpsc::UnboundedSender<LinkEvent>,
    generation: u64,
    endpoint: Option<Arc<dyn MediaEndpoint>>,
    link: PeerLink,
    forwarders: Vec<JoinHandle<()>>,
}

impl PeerLinkManager {
    /// Build a manager and the event receiver the session loop drains.
    pub fn new(
        session_id: SessionId,
        config: LinkConfig,
        store: Arc<dyn SignalingStore>,
        factory: Arc<dyn MediaEndpointFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                session_id,
                config,
                store,
                factory,
                events: tx,
                generation: 0,
                endpoint: None,
                link: PeerLink::new(),
                forwarders: Vec::new(),
            },
            rx,
        )
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Run the full initiate sequence as the caller role: tear down any
    /// previous attempt, wipe stale candidates, create a fresh endpoint,
    /// publish the offer, and subscribe for the answer and callee
    /// candidates. On failure the link stays down until the next explicit
    /// renegotiation trigger; there is no silent retry loop.
    pub async fn initiate(&mut self) -> Result<()> {
        self.teardown().await;
        self.generation += 1;
        let generation = self.generation;
        info!(session_id = %self.session_id, generation, "initiating peer link");

        self.store.clear_candidates(&self.session_id).await?;

        let (endpoint_tx, mut endpoint_rx) = mpsc::unbounded_channel();
        let endpoint = self.factory.create(&self.config, endpoint_tx).await?;

        let offer = endpoint.create_offer().await?;
        self.link.set_local(offer.clone());
        self.store.publish_offer(&self.session_id, &offer).await?;

        let mut answer_rx = self.store.subscribe_answer(&self.session_id).await?;
        let mut candidate_rx = self
            .store
            .subscribe_candidates(&self.session_id, LinkRole::Callee)
            .await?;

        let events = self.events.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(answer) = answer_rx.recv().await {
                if events.send(LinkEvent::Answer { generation, answer }).is_err() {
                    break;
                }
            }
        }));

        let events = self.events.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(candidate) = candidate_rx.recv().await {
                if events
                    .send(LinkEvent::RemoteCandidate {
                        generation,
                        candidate,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }));

        let events = self.events.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(event) = endpoint_rx.recv().await {
                if events.send(LinkEvent::Endpoint { generation, event }).is_err() {
                    break;
                }
            }
        }));

        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Apply the remote answer. Returns true if it took effect; a stale
    /// generation or an already-set remote description is a no-op. Queued
    /// candidates are flushed after the description is applied.
    pub async fn handle_answer(
        &mut self,
        generation: u64,
        answer: SessionDescription,
    ) -> Result<bool> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "stale answer dropped");
            return Ok(false);
        }
        if !self.link.try_set_remote(answer.clone()) {
            return Ok(false);
        }
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::LinkNegotiationFailed("no live endpoint".to_string()))?
            .clone();
        endpoint.apply_answer(&answer).await?;

        for candidate in self.link.take_queued() {
            if let Err(e) = endpoint.apply_candidate(&candidate).await {
                warn!("queued candidate rejected: {e}");
            }
        }
        Ok(true)
    }

    /// Apply one inbound candidate. Duplicates and candidates for a closed
    /// or superseded link are dropped, not retried.
    pub async fn handle_remote_candidate(&mut self, generation: u64, candidate: IceCandidate) {
        if generation != self.generation {
            return;
        }
        match self.link.admit_candidate(&candidate) {
            CandidateAdmission::Apply => {
                if let Some(endpoint) = &self.endpoint {
                    if let Err(e) = endpoint.apply_candidate(&candidate).await {
                        warn!("candidate rejected: {e}");
                    }
                }
            }
            CandidateAdmission::Queued | CandidateAdmission::Dropped => {}
        }
    }

    /// Fold in one endpoint notification. Returns the new link state when
    /// the event changed it, so the session loop can react.
    pub async fn handle_endpoint_event(
        &mut self,
        generation: u64,
        event: EndpointEvent,
    ) -> Option<LinkState> {
        if generation != self.generation {
            return None;
        }
        match event {
            EndpointEvent::LocalCandidate(candidate) => {
                if let Err(e) = self
                    .store
                    .publish_candidate(&self.session_id, LinkRole::Caller, &candidate)
                    .await
                {
                    warn!("failed to publish local candidate: {e}");
                }
                None
            }
            EndpointEvent::StateChanged(state) => {
                self.link.on_state(state);
                info!(?state, "peer link state changed");
                Some(state)
            }
            EndpointEvent::RemoteTrack { kind } => {
                info!(kind, "remote track attached");
                None
            }
        }
    }

    /// Write one sample onto the outgoing track. Tolerant of the track
    /// having no bound peer yet.
    pub async fn send_media(&self, data: Bytes, duration: Duration) {
        if !self.link.is_connected() {
            return;
        }
        if let Some(endpoint) = &self.endpoint {
            if let Err(e) = endpoint.send_media(data, duration).await {
                debug!("media send skipped: {e}");
            }
        }
    }

    /// Tear down the current attempt. Idempotent; a manager with no live
    /// endpoint just resets its mirror state.
    pub async fn teardown(&mut self) {
        for task in self.forwarders.drain(..) {
            task.abort();
        }
        if let Some(endpoint) = self.endpoint.take() {
            if let Err(e) = endpoint.close().await {
                debug!("endpoint close reported: {e}");
            }
        }
        self.link.close();
        self.link = PeerLink::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::MemorySignalingStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockEndpoint {
        answers: Mutex<Vec<SessionDescription>>,
        candidates: Mutex<Vec<IceCandidate>>,
        closed: Mutex<bool>,
    }

    #[async_trait]
    impl MediaEndpoint for MockEndpoint {
        async fn create_offer(&self) -> Result<SessionDescription> {
            Ok(SessionDescription::offer("v=0 mock"))
        }

        async fn apply_answer(&self, answer: &SessionDescription) -> Result<()> {
            self.answers.lock().push(answer.clone());
            Ok(())
        }

        async fn apply_candidate(&self, candidate: &IceCandidate) -> Result<()> {
            self.candidates.lock().push(candidate.clone());
            Ok(())
        }

        async fn send_media(&self, _data: Bytes, _duration: Duration) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock() = true;
            Ok(())
        }
    }

    struct MockFactory {
        endpoints: Mutex<Vec<Arc<MockEndpoint>>>,
        event_txs: Mutex<Vec<mpsc::UnboundedSender<EndpointEvent>>>,
    }

    impl MockFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                endpoints: Mutex::new(Vec::new()),
                event_txs: Mutex::new(Vec::new()),
            })
        }

        fn latest(&self) -> Arc<MockEndpoint> {
            self.endpoints.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl MediaEndpointFactory for MockFactory {
        async fn create(
            &self,
            _config: &LinkConfig,
            events: mpsc::UnboundedSender<EndpointEvent>,
        ) -> Result<Arc<dyn MediaEndpoint>> {
            let endpoint = Arc::new(MockEndpoint::default());
            self.endpoints.lock().push(endpoint.clone());
            self.event_txs.lock().push(events);
            Ok(endpoint)
        }
    }

    fn candidate(n: u16) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:{n} 1 udp 1 10.0.0.1 4000 typ host"),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }
    }

    fn manager(
        store: Arc<MemorySignalingStore>,
        factory: Arc<MockFactory>,
    ) -> (PeerLinkManager, mpsc::UnboundedReceiver<LinkEvent>) {
        PeerLinkManager::new(
            "s1".to_string(),
            LinkConfig::default(),
            store,
            factory,
        )
    }

    #[tokio::test]
    async fn initiate_publishes_offer_and_bumps_generation() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store.clone(), factory.clone());

        mgr.initiate().await.unwrap();
        assert_eq!(mgr.generation(), 1);
        assert_eq!(
            store.fetch_offer("s1").await.unwrap(),
            Some(SessionDescription::offer("v=0 mock"))
        );

        mgr.initiate().await.unwrap();
        assert_eq!(mgr.generation(), 2);
        // The first endpoint was closed by the renegotiation.
        assert!(*factory.endpoints.lock()[0].closed.lock());
    }

    #[tokio::test]
    async fn answer_applies_once_and_flushes_queued_candidates() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store, factory.clone());
        mgr.initiate().await.unwrap();
        let generation = mgr.generation();

        mgr.handle_remote_candidate(generation, candidate(1)).await;
        mgr.handle_remote_candidate(generation, candidate(2)).await;
        let endpoint = factory.latest();
        assert!(endpoint.candidates.lock().is_empty());

        let applied = mgr
            .handle_answer(generation, SessionDescription::answer("v=0 remote"))
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(endpoint.answers.lock().len(), 1);
        assert_eq!(endpoint.candidates.lock().len(), 2);

        // Redelivered answer is a no-op.
        let applied = mgr
            .handle_answer(generation, SessionDescription::answer("v=0 again"))
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(endpoint.answers.lock().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_candidate_is_applied_once() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store, factory.clone());
        mgr.initiate().await.unwrap();
        let generation = mgr.generation();
        mgr.handle_answer(generation, SessionDescription::answer("v=0"))
            .await
            .unwrap();

        mgr.handle_remote_candidate(generation, candidate(7)).await;
        mgr.handle_remote_candidate(generation, candidate(7)).await;
        assert_eq!(factory.latest().candidates.lock().len(), 1);
    }

    #[tokio::test]
    async fn stale_generation_events_are_discarded() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store, factory.clone());
        mgr.initiate().await.unwrap();
        let old = mgr.generation();
        mgr.initiate().await.unwrap();

        let applied = mgr
            .handle_answer(old, SessionDescription::answer("stale"))
            .await
            .unwrap();
        assert!(!applied);
        mgr.handle_remote_candidate(old, candidate(1)).await;
        assert!(factory.latest().candidates.lock().is_empty());
        assert!(mgr
            .handle_endpoint_event(old, EndpointEvent::StateChanged(LinkState::Connected))
            .await
            .is_none());
        assert!(!mgr.is_connected());
    }

    #[tokio::test]
    async fn state_change_marks_connected_and_local_candidates_are_published() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store.clone(), factory);
        mgr.initiate().await.unwrap();
        let generation = mgr.generation();

        let state = mgr
            .handle_endpoint_event(generation, EndpointEvent::StateChanged(LinkState::Connected))
            .await;
        assert_eq!(state, Some(LinkState::Connected));
        assert!(mgr.is_connected());

        mgr.handle_endpoint_event(generation, EndpointEvent::LocalCandidate(candidate(9)))
            .await;
        assert_eq!(store.candidate_count("s1", LinkRole::Caller), 1);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let store = Arc::new(MemorySignalingStore::new());
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store, factory.clone());
        mgr.initiate().await.unwrap();
        mgr.teardown().await;
        mgr.teardown().await;
        assert!(!mgr.is_connected());
        assert!(*factory.latest().closed.lock());
    }

    #[tokio::test]
    async fn signaling_outage_surfaces_and_leaves_link_down() {
        let store = Arc::new(MemorySignalingStore::new());
        store.set_unavailable(true);
        let factory = MockFactory::new();
        let (mut mgr, _rx) = manager(store, factory);
        assert!(matches!(
            mgr.initiate().await,
            Err(Error::SignalingUnavailable(_))
        ));
        assert!(!mgr.is_connected());
    }
}
