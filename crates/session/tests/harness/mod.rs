//! Shared fixtures for the end-to-end session scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rangelink_core::config::LinkConfig;
use rangelink_core::model::{Round, RoundId};
use rangelink_core::{Error, Result};
use rangelink_session::gesture::{
    Keypoint, PoseFrame, KEYPOINT_LEFT_WRIST, KEYPOINT_NOSE, KEYPOINT_RIGHT_WRIST,
};
use rangelink_session::link::{EndpointEvent, MediaEndpoint, MediaEndpointFactory};
use rangelink_session::recorder::{FinalizedRecording, MediaChunk};
use rangelink_session::signaling::{
    IceCandidate, LinkRole, MemorySignalingStore, SessionDescription, SignalingStore,
};
use rangelink_session::upload::VideoUploader;

/// Route session logs through the test writer; `RUST_LOG` filters apply.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Endpoint that records everything applied to it instead of talking to a
/// network.
#[derive(Default)]
pub struct StubEndpoint {
    pub answers: Mutex<Vec<SessionDescription>>,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub closed: AtomicBool,
}

#[async_trait]
impl MediaEndpoint for StubEndpoint {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::offer("v=0 stub offer"))
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
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out stub endpoints and keeping the event senders so a
/// test can drive connection state changes.
#[derive(Default)]
pub struct StubFactory {
    endpoints: Mutex<Vec<Arc<StubEndpoint>>>,
    event_txs: Mutex<Vec<mpsc::UnboundedSender<EndpointEvent>>>,
}

impl StubFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn latest(&self) -> Arc<StubEndpoint> {
        self.endpoints.lock().last().cloned().expect("no endpoint created")
    }

    /// Push an event as if it came from the newest endpoint.
    pub fn push_event(&self, event: EndpointEvent) {
        let txs = self.event_txs.lock();
        let tx = txs.last().expect("no endpoint created");
        let _ = tx.send(event);
    }
}

#[async_trait]
impl MediaEndpointFactory for StubFactory {
    async fn create(
        &self,
        _config: &LinkConfig,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn MediaEndpoint>> {
        let endpoint = Arc::new(StubEndpoint::default());
        self.endpoints.lock().push(endpoint.clone());
        self.event_txs.lock().push(events);
        Ok(endpoint)
    }
}

/// Uploader that records accepted uploads and rejects empty blobs the way
/// the HTTP pipeline does.
#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<(RoundId, FinalizedRecording)>>,
    pub rejected: Mutex<Vec<RoundId>>,
    pub retries: Mutex<Vec<RoundId>>,
}

impl RecordingUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl VideoUploader for RecordingUploader {
    async fn upload_pose_video(
        &self,
        round_id: &RoundId,
        recording: &FinalizedRecording,
    ) -> Result<()> {
        if recording.is_empty() {
            self.rejected.lock().push(round_id.clone());
            return Err(Error::upload(round_id, "empty recording"));
        }
        self.uploads.lock().push((round_id.clone(), recording.clone()));
        Ok(())
    }

    async fn retry_processing(&self, round_id: &RoundId) -> Result<()> {
        self.retries.lock().push(round_id.clone());
        Ok(())
    }
}

pub fn right_overhead() -> PoseFrame {
    PoseFrame::new(vec![
        Keypoint::new(KEYPOINT_NOSE, 0.5, 0.3, 0.9),
        Keypoint::new(KEYPOINT_RIGHT_WRIST, 0.7, 0.1, 0.9),
    ])
}

pub fn left_overhead() -> PoseFrame {
    PoseFrame::new(vec![
        Keypoint::new(KEYPOINT_NOSE, 0.5, 0.3, 0.9),
        Keypoint::new(KEYPOINT_LEFT_WRIST, 0.3, 0.1, 0.9),
    ])
}

pub fn chunk(seq: u64) -> MediaChunk {
    MediaChunk::new(seq, Bytes::from(vec![seq as u8; 8]), Duration::from_secs(1))
}

pub fn round(id: &str, session_id: &str) -> Round {
    Round::new(id, session_id)
}

/// Play the joining device's half of the handshake: read the offer,
/// publish an answer, and contribute one callee candidate.
pub async fn drive_callee(store: &MemorySignalingStore, session_id: &str) {
    let offer = store
        .fetch_offer(session_id)
        .await
        .expect("store reachable")
        .expect("offer published");
    assert_eq!(offer.sdp, "v=0 stub offer");
    store
        .publish_answer(session_id, &SessionDescription::answer("v=0 stub answer"))
        .await
        .expect("answer published");
    store
        .publish_candidate(
            session_id,
            LinkRole::Callee,
            &IceCandidate {
                candidate: "candidate:1 1 udp 2122260223 10.0.0.2 40004 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            },
        )
        .await
        .expect("candidate published");
}
