//! WebRTC-backed media endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use rangelink_core::config::LinkConfig;
use rangelink_core::{Error, Result};

use crate::signaling::{IceCandidate, SessionDescription};

use super::peer::LinkState;
use super::{EndpointEvent, MediaEndpoint, MediaEndpointFactory};

/// Builds webrtc-rs peer connections configured from [`LinkConfig`].
#[derive(Debug, Default)]
pub struct RtcEndpointFactory;

struct RtcEndpoint {
    peer_connection: Arc<RTCPeerConnection>,
    video_track: Arc<TrackLocalStaticSample>,
}

fn negotiation_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::LinkNegotiationFailed(format!("{context}: {e}"))
}

#[async_trait]
impl MediaEndpointFactory for RtcEndpointFactory {
    async fn create(
        &self,
        config: &LinkConfig,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn MediaEndpoint>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| negotiation_err("failed to register codecs", e))?;
        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| negotiation_err("failed to register interceptors", e))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| negotiation_err("failed to create peer connection", e))?,
        );

        // Outgoing pose-camera video track.
        let video_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "video/vp8".to_string(),
                clock_rate: 90000,
                ..Default::default()
            },
            "pose-video".to_string(),
            "pose-stream".to_string(),
        ));
        peer_connection
            .add_track(Arc::clone(&video_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| negotiation_err("failed to add video track", e))?;

        let tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate| {
            let tx = tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(json) => {
                        let _ = tx.send(EndpointEvent::LocalCandidate(IceCandidate {
                            candidate: json.candidate,
                            sdp_mid: json.sdp_mid,
                            sdp_mline_index: json.sdp_mline_index,
                        }));
                    }
                    Err(e) => debug!("unserializable local candidate dropped: {e}"),
                }
            })
        }));

        let tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = tx.clone();
                Box::pin(async move {
                    let state = match s {
                        RTCPeerConnectionState::New => LinkState::New,
                        RTCPeerConnectionState::Connecting => LinkState::Connecting,
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Failed => LinkState::Disconnected,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                        _ => return,
                    };
                    let _ = tx.send(EndpointEvent::StateChanged(state));
                })
            },
        ));

        let tx = events;
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = tx.clone();
            let kind = track.kind().to_string();
            Box::pin(async move {
                info!(kind, "remote track received");
                let _ = tx.send(EndpointEvent::RemoteTrack { kind });
            })
        }));

        Ok(Arc::new(RtcEndpoint {
            peer_connection,
            video_track,
        }))
    }
}

#[async_trait]
impl MediaEndpoint for RtcEndpoint {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| negotiation_err("failed to create offer", e))?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| negotiation_err("failed to set local description", e))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn apply_answer(&self, answer: &SessionDescription) -> Result<()> {
        let desc = RTCSessionDescription::answer(answer.sdp.clone())
            .map_err(|e| negotiation_err("invalid answer sdp", e))?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(|e| negotiation_err("remote description rejected", e))
    }

    async fn apply_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| negotiation_err("candidate rejected", e))
    }

    async fn send_media(&self, data: Bytes, duration: Duration) -> Result<()> {
        let sample = webrtc::media::Sample {
            data,
            duration,
            timestamp: std::time::SystemTime::now(),
            ..Default::default()
        };
        self.video_track
            .write_sample(&sample)
            .await
            .map_err(|e| Error::Other(format!("failed to write video sample: {e}")))
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::Other(format!("failed to close peer connection: {e}")))
    }
}
