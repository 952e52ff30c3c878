use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use rangelink_core::config::SessionConfig;
use rangelink_core::model::{Round, SessionId};

use crate::channel::{ChannelSink, InboundEvent, OutboundEvent};
use crate::gesture::{GestureTrigger, TriggerAction};
use crate::link::{LinkEvent, LinkState, MediaEndpointFactory, PeerLinkManager};
use crate::presence::PresenceMonitor;
use crate::recorder::{FinalizedRecording, RollingRecorder};
use crate::signaling::SignalingStore;
use crate::upload::{UploadLedger, VideoUploader};

use super::{SessionHandle, SessionInput, SessionStatus};

/// Sleeps until the deadline, or forever when there is none. Built fresh
/// every loop turn so arming or cancelling a deadline takes effect on the
/// next turn.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// The per-session event loop.
///
/// Owns the gesture trigger, the rolling recorder, the peer link manager,
/// presence, and the upload ledger. The presence monitor signals
/// renegotiation through its watch counter; this loop is the counter's
/// only reader and rebuilds the link on every increment.
pub struct SessionActor {
    session_id: SessionId,
    config: SessionConfig,
    trigger: GestureTrigger,
    recorder: RollingRecorder,
    link: PeerLinkManager,
    presence: PresenceMonitor,
    ledger: UploadLedger,
    sink: Arc<dyn ChannelSink>,
    uploader: Arc<dyn VideoUploader>,
    input_tx: mpsc::UnboundedSender<SessionInput>,
    status_tx: watch::Sender<SessionStatus>,
    countdown_deadline: Option<Instant>,
    negotiation_deadline: Option<Instant>,
    current_round: Option<Round>,
    pending_uploads: VecDeque<FinalizedRecording>,
}

impl SessionActor {
    /// Spawn the loop and return the handle the embedding surface drives.
    pub fn spawn(
        config: SessionConfig,
        session_id: SessionId,
        store: Arc<dyn SignalingStore>,
        factory: Arc<dyn MediaEndpointFactory>,
        sink: Arc<dyn ChannelSink>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        uploader: Arc<dyn VideoUploader>,
    ) -> SessionHandle {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (presence, reneg_rx) = PresenceMonitor::pair();
        let (link, link_events) =
            PeerLinkManager::new(session_id.clone(), config.link.clone(), store, factory);
        let (status_tx, status_rx) = watch::channel(SessionStatus::new(session_id.clone()));

        let actor = Self {
            session_id,
            trigger: GestureTrigger::new(&config.gesture),
            recorder: RollingRecorder::new(&config.recorder),
            config,
            link,
            presence,
            ledger: UploadLedger::new(),
            sink,
            uploader,
            input_tx: input_tx.clone(),
            status_tx,
            countdown_deadline: None,
            negotiation_deadline: None,
            current_round: None,
            pending_uploads: VecDeque::new(),
        };
        tokio::spawn(actor.run(input_rx, inbound, link_events, reneg_rx));

        SessionHandle::new(input_tx, status_rx)
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
        mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
        mut reneg_rx: watch::Receiver<u64>,
    ) {
        info!(session_id = %self.session_id, "session started");
        self.emit(OutboundEvent::StartSession {
            session_id: self.session_id.clone(),
        })
        .await;
        self.start_link().await;
        self.publish_status(false);

        loop {
            let countdown = deadline(self.countdown_deadline);
            let negotiation = deadline(self.negotiation_deadline);

            tokio::select! {
                biased;

                changed = reneg_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = *reneg_rx.borrow_and_update();
                    self.on_renegotiate(count).await;
                }

                Some(event) = link_events.recv() => {
                    self.on_link_event(event).await;
                }

                Some(event) = inbound.recv() => {
                    if self.on_inbound(event).await {
                        break;
                    }
                }

                maybe = inputs.recv() => {
                    match maybe {
                        Some(input) => {
                            if self.on_input(input).await {
                                break;
                            }
                        }
                        // Every handle dropped: nothing can drive us.
                        None => break,
                    }
                }

                _ = countdown => {
                    self.countdown_deadline = None;
                    let action = self.trigger.countdown_elapsed(self.link.is_connected());
                    self.apply(action).await;
                }

                _ = negotiation => {
                    self.on_negotiation_timeout().await;
                }
            }
            self.publish_status(false);
        }

        self.finish().await;
    }

    async fn start_link(&mut self) {
        match self.link.initiate().await {
            Ok(()) => {
                self.negotiation_deadline =
                    Some(Instant::now() + self.config.link.negotiation_timeout());
            }
            Err(e) => {
                // Safe inert state; retried only on the next explicit
                // renegotiation trigger.
                warn!("link initiation failed: {e}");
                self.negotiation_deadline = None;
            }
        }
    }

    async fn on_renegotiate(&mut self, count: u64) {
        info!(count, "renegotiation requested, rebuilding link");
        let action = self.trigger.link_disconnected();
        self.apply(action).await;
        self.start_link().await;
    }

    async fn on_negotiation_timeout(&mut self) {
        self.negotiation_deadline = None;
        warn!(
            session_id = %self.session_id,
            "offer/answer exchange timed out, tearing the link down"
        );
        self.link.teardown().await;
        let action = self.trigger.link_disconnected();
        self.apply(action).await;
    }

    async fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Answer { generation, answer } => {
                match self.link.handle_answer(generation, answer).await {
                    Ok(true) => debug!("remote answer applied"),
                    Ok(false) => {}
                    Err(e) => {
                        warn!("remote answer rejected: {e}");
                        self.link.teardown().await;
                        self.negotiation_deadline = None;
                        let action = self.trigger.link_disconnected();
                        self.apply(action).await;
                    }
                }
            }
            LinkEvent::RemoteCandidate {
                generation,
                candidate,
            } => {
                self.link.handle_remote_candidate(generation, candidate).await;
            }
            LinkEvent::Endpoint { generation, event } => {
                if let Some(state) = self.link.handle_endpoint_event(generation, event).await {
                    match state {
                        LinkState::Connected => {
                            self.negotiation_deadline = None;
                            self.trigger.link_connected();
                        }
                        LinkState::Disconnected | LinkState::Closed => {
                            let action = self.trigger.link_disconnected();
                            self.apply(action).await;
                        }
                        LinkState::New | LinkState::Connecting => {}
                    }
                }
            }
        }
    }

    /// Returns true when the session should end.
    async fn on_inbound(&mut self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::RecordingStarted { round } => {
                info!(round_id = %round.id, "round created");
                self.current_round = Some(round);
                if let Some(finalized) = self.pending_uploads.pop_front() {
                    self.begin_upload(finalized).await;
                }
            }
            InboundEvent::ParticipantJoin { users } => {
                self.presence.on_join(users);
            }
            InboundEvent::ParticipantLeave { users } => {
                self.on_leave(users).await;
            }
            InboundEvent::UploadProgress { status } => {
                self.ledger.on_progress(&status.round_id, status.progress);
            }
            InboundEvent::UploadDone { round_id } => {
                self.ledger.on_done(&round_id);
            }
            InboundEvent::SessionEnded => {
                info!("session ended by the service");
                return true;
            }
        }
        false
    }

    /// The remote camera left. A recording without the second camera is
    /// meaningless, so it stops now and is discarded rather than uploaded.
    /// The presence monitor's counter bump triggers the link rebuild.
    async fn on_leave(&mut self, users: std::collections::HashMap<String, String>) {
        let was_recording = self.trigger.is_recording();
        self.trigger.force_stop();
        self.countdown_deadline = None;
        if was_recording {
            if let Some(discarded) = self.recorder.stop() {
                info!(
                    chunks = discarded.chunk_count,
                    "recording discarded after remote device left"
                );
            }
            self.emit(OutboundEvent::RecordingStopped {
                session_id: self.session_id.clone(),
            })
            .await;
            self.current_round = None;
            if !self.pending_uploads.is_empty() {
                info!(
                    held = self.pending_uploads.len(),
                    "dropping held recordings, their rounds will never arrive"
                );
                self.pending_uploads.clear();
            }
        }
        self.presence.on_leave(users);
    }

    /// Returns true when the session should end.
    async fn on_input(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Pose(frame) => {
                let action = self.trigger.observe(&frame, self.link.is_connected());
                self.apply(action).await;
            }
            SessionInput::Chunk(chunk) => {
                self.link.send_media(chunk.data.clone(), chunk.duration).await;
                self.recorder.on_chunk(chunk);
            }
            SessionInput::ManualStart => {
                let action = self.trigger.manual_start(self.link.is_connected());
                self.apply(action).await;
            }
            SessionInput::ManualStop => {
                let action = self.trigger.manual_stop();
                self.apply(action).await;
            }
            SessionInput::RetryProcessing(round_id) => {
                let uploader = self.uploader.clone();
                tokio::spawn(async move {
                    match uploader.retry_processing(&round_id).await {
                        Ok(()) => info!(%round_id, "processing retry requested"),
                        Err(e) => warn!(%round_id, "processing retry failed: {e}"),
                    }
                });
            }
            SessionInput::UploadFinished { round_id, result } => match result {
                Ok(()) => info!(%round_id, "upload accepted, awaiting processing"),
                Err(e) => {
                    warn!(%round_id, "upload failed: {e}");
                    self.ledger.on_failed(&round_id);
                }
            },
            SessionInput::Shutdown => return true,
        }
        false
    }

    async fn apply(&mut self, action: Option<TriggerAction>) {
        match action {
            Some(TriggerAction::ArmCountdown) => {
                self.countdown_deadline =
                    Some(Instant::now() + self.config.gesture.countdown());
            }
            Some(TriggerAction::CancelCountdown) => {
                self.countdown_deadline = None;
            }
            Some(TriggerAction::StartRecording) => {
                self.recorder.start(Utc::now().timestamp_millis());
                self.emit(OutboundEvent::RecordingStarted {
                    session_id: self.session_id.clone(),
                })
                .await;
            }
            Some(TriggerAction::StopRecording) => {
                let finalized = self.recorder.stop();
                self.emit(OutboundEvent::RecordingStopped {
                    session_id: self.session_id.clone(),
                })
                .await;
                if let Some(finalized) = finalized {
                    self.begin_upload(finalized).await;
                }
            }
            None => {}
        }
    }

    /// Kick off the upload for a finalized recording. If the service has
    /// not told us the round yet, the recording queues behind any earlier
    /// ones still waiting; each incoming round drains one in order.
    async fn begin_upload(&mut self, finalized: FinalizedRecording) {
        let Some(round) = self.current_round.take() else {
            debug!(
                held = self.pending_uploads.len() + 1,
                "recording finalized before round arrived, holding"
            );
            self.pending_uploads.push_back(finalized);
            return;
        };

        self.ledger.begin(round.id.clone(), finalized.started_at_ms);
        let uploader = self.uploader.clone();
        let feedback = self.input_tx.clone();
        tokio::spawn(async move {
            let result = uploader.upload_pose_video(&round.id, &finalized).await;
            let _ = feedback.send(SessionInput::UploadFinished {
                round_id: round.id,
                result,
            });
        });
    }

    async fn emit(&self, event: OutboundEvent) {
        if let Err(e) = self.sink.send(event).await {
            warn!("channel send failed: {e}");
        }
    }

    fn publish_status(&self, ended: bool) {
        self.status_tx.send_replace(SessionStatus {
            session_id: self.session_id.clone(),
            link_connected: self.link.is_connected(),
            trigger: self.trigger.state(),
            recording: self.recorder.is_recording(),
            buffered_chunks: self.recorder.buffered_chunks(),
            participants: self.presence.presence().len(),
            renegotiations: self.presence.renegotiation_count(),
            current_round: self.current_round.as_ref().map(|r| r.id.clone()),
            uploads: self.ledger.len(),
            ended,
        });
    }

    async fn finish(mut self) {
        info!(session_id = %self.session_id, "session shutting down");
        if self.trigger.is_recording() {
            let action = self.trigger.manual_stop();
            self.apply(action).await;
        }
        self.emit(OutboundEvent::SessionEnd {
            session_id: self.session_id.clone(),
        })
        .await;
        self.link.teardown().await;
        self.publish_status(true);
    }
}
