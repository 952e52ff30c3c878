//! Session orchestration.
//!
//! One [`SessionActor`] per capture session owns every piece of mutable
//! session state and consumes all inputs (pose frames, media chunks,
//! channel events, link events, timers) from a single queue, so there is
//! no cross-callback re-entrancy: each input is handled to completion
//! before the next one is looked at.

mod actor;

pub use actor::SessionActor;

use tokio::sync::{mpsc, watch};

use rangelink_core::model::{RoundId, SessionId};
use rangelink_core::{Error, Result};

use crate::gesture::{PoseFrame, TriggerState};
use crate::recorder::MediaChunk;

/// Inputs accepted by the session loop.
#[derive(Debug)]
pub enum SessionInput {
    /// One pose estimate from the local camera.
    Pose(PoseFrame),
    /// One encoded media chunk from the local camera.
    Chunk(MediaChunk),
    /// User pressed record.
    ManualStart,
    /// User pressed stop.
    ManualStop,
    /// User asked to re-run server-side processing for a failed round.
    RetryProcessing(RoundId),
    /// An upload task finished its submit call.
    UploadFinished {
        round_id: RoundId,
        result: Result<()>,
    },
    /// End the session.
    Shutdown,
}

/// Point-in-time view of the session, published on a watch channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub link_connected: bool,
    pub trigger: TriggerState,
    pub recording: bool,
    pub buffered_chunks: usize,
    pub participants: usize,
    pub renegotiations: u64,
    pub current_round: Option<RoundId>,
    pub uploads: usize,
    pub ended: bool,
}

impl SessionStatus {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            link_connected: false,
            trigger: TriggerState::Idle,
            recording: false,
            buffered_chunks: 0,
            participants: 0,
            renegotiations: 0,
            current_round: None,
            uploads: 0,
            ended: false,
        }
    }
}

/// Handle held by the embedding surface (UI, capture loop, tests).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub(crate) fn new(
        inputs: mpsc::UnboundedSender<SessionInput>,
        status: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self { inputs, status }
    }

    fn send(&self, input: SessionInput) -> Result<()> {
        self.inputs
            .send(input)
            .map_err(|_| Error::Channel("session loop is gone".to_string()))
    }

    pub fn pose(&self, frame: PoseFrame) -> Result<()> {
        self.send(SessionInput::Pose(frame))
    }

    pub fn chunk(&self, chunk: MediaChunk) -> Result<()> {
        self.send(SessionInput::Chunk(chunk))
    }

    pub fn manual_start(&self) -> Result<()> {
        self.send(SessionInput::ManualStart)
    }

    pub fn manual_stop(&self) -> Result<()> {
        self.send(SessionInput::ManualStop)
    }

    pub fn retry_processing(&self, round_id: impl Into<RoundId>) -> Result<()> {
        self.send(SessionInput::RetryProcessing(round_id.into()))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionInput::Shutdown)
    }

    /// Watch for status snapshots.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Latest snapshot.
    pub fn current(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}
