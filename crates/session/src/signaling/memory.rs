//! In-memory signaling store
//!
//! Document-per-session map with the same change-notification semantics as
//! the hosted store: answer subscribers see upserts, candidate subscribers
//! get a replay of existing entries followed by live appends. Used by tests
//! and single-process demos.

use super::{IceCandidate, LinkRole, SessionDescription, SignalingStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use rangelink_core::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Default)]
struct SessionDocument {
    offer: Option<SessionDescription>,
    answer: Option<SessionDescription>,
    caller_candidates: Vec<IceCandidate>,
    callee_candidates: Vec<IceCandidate>,
    answer_subscribers: Vec<mpsc::UnboundedSender<SessionDescription>>,
    caller_subscribers: Vec<mpsc::UnboundedSender<IceCandidate>>,
    callee_subscribers: Vec<mpsc::UnboundedSender<IceCandidate>>,
}

impl SessionDocument {
    fn candidates(&mut self, role: LinkRole) -> &mut Vec<IceCandidate> {
        match role {
            LinkRole::Caller => &mut self.caller_candidates,
            LinkRole::Callee => &mut self.callee_candidates,
        }
    }

    fn subscribers(&mut self, role: LinkRole) -> &mut Vec<mpsc::UnboundedSender<IceCandidate>> {
        match role {
            LinkRole::Caller => &mut self.caller_subscribers,
            LinkRole::Callee => &mut self.callee_subscribers,
        }
    }
}

/// In-memory [`SignalingStore`] implementation
#[derive(Default)]
pub struct MemorySignalingStore {
    documents: Mutex<HashMap<String, SessionDocument>>,
    unavailable: AtomicBool,
}

impl MemorySignalingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the unreachable-store failure mode
    ///
    /// While set, every operation fails with `SignalingUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::SignalingUnavailable(
                "signaling store unreachable".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Number of candidates currently stored for a role (test observation)
    pub fn candidate_count(&self, session_id: &str, role: LinkRole) -> usize {
        let mut documents = self.documents.lock();
        documents
            .entry(session_id.to_string())
            .or_default()
            .candidates(role)
            .len()
    }
}

#[async_trait]
impl SignalingStore for MemorySignalingStore {
    async fn publish_offer(&self, session_id: &str, offer: &SessionDescription) -> Result<()> {
        self.check_available()?;
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        doc.offer = Some(offer.clone());
        Ok(())
    }

    async fn publish_answer(&self, session_id: &str, answer: &SessionDescription) -> Result<()> {
        self.check_available()?;
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        doc.answer = Some(answer.clone());
        doc.answer_subscribers
            .retain(|tx| tx.send(answer.clone()).is_ok());
        Ok(())
    }

    async fn fetch_offer(&self, session_id: &str) -> Result<Option<SessionDescription>> {
        self.check_available()?;
        let documents = self.documents.lock();
        Ok(documents.get(session_id).and_then(|d| d.offer.clone()))
    }

    async fn subscribe_answer(
        &self,
        session_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<SessionDescription>> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        // snapshot semantics: an already-present answer is delivered too
        if let Some(answer) = &doc.answer {
            let _ = tx.send(answer.clone());
        }
        doc.answer_subscribers.push(tx);
        Ok(rx)
    }

    async fn publish_candidate(
        &self,
        session_id: &str,
        role: LinkRole,
        candidate: &IceCandidate,
    ) -> Result<()> {
        self.check_available()?;
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        doc.candidates(role).push(candidate.clone());
        doc.subscribers(role)
            .retain(|tx| tx.send(candidate.clone()).is_ok());
        Ok(())
    }

    async fn subscribe_candidates(
        &self,
        session_id: &str,
        role: LinkRole,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        // replay existing entries, then deliver live appends
        for candidate in doc.candidates(role).clone() {
            let _ = tx.send(candidate);
        }
        doc.subscribers(role).push(tx);
        Ok(rx)
    }

    async fn clear_candidates(&self, session_id: &str) -> Result<()> {
        self.check_available()?;
        let mut documents = self.documents.lock();
        let doc = documents.entry(session_id.to_string()).or_default();
        doc.caller_candidates.clear();
        doc.callee_candidates.clear();
        Ok(())
    }
}
