//! Live dual-stream capture orchestration
//!
//! This crate coordinates a two-camera training session: a pose-facing
//! device (this side) and a target-facing device linked over a direct
//! peer-to-peer media connection, with recording driven by body-pose
//! gestures and a rolling pre-roll buffer so the lead-in to a start
//! gesture is never lost.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SessionActor (one per session, single input queue)          │
//! │  ├─ GestureTrigger     pose frames → start/stop intents      │
//! │  ├─ RollingRecorder    pre-roll buffer + recording windows   │
//! │  ├─ PeerLinkManager    offer/answer/ICE over SignalingStore  │
//! │  │   └─ MediaEndpoint  webrtc-rs peer connection             │
//! │  ├─ PresenceMonitor    join/leave → renegotiation counter    │
//! │  └─ UploadLedger       out-of-band progress reconciliation   │
//! │       ↑ events                ↓ uploads                      │
//! │  ChannelSink (real-time)   VideoUploader (HTTP multipart)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangelink_core::config::SessionConfig;
//! use rangelink_session::channel::MemoryChannel;
//! use rangelink_session::link::RtcEndpointFactory;
//! use rangelink_session::session::SessionActor;
//! use rangelink_session::signaling::MemorySignalingStore;
//! use rangelink_session::upload::HttpUploader;
//!
//! # fn example() -> rangelink_core::Result<()> {
//! let config = SessionConfig::default();
//! let uploader = Arc::new(HttpUploader::new(&config.upload, "session-1")?);
//! let (sink, inbound, _remote) = MemoryChannel::pair();
//!
//! let handle = SessionActor::spawn(
//!     config,
//!     "session-1".to_string(),
//!     Arc::new(MemorySignalingStore::new()),
//!     Arc::new(RtcEndpointFactory),
//!     Arc::new(sink),
//!     inbound,
//!     uploader,
//! );
//! handle.manual_start()?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod channel;
pub mod gesture;
pub mod link;
pub mod presence;
pub mod recorder;
pub mod session;
pub mod signaling;
pub mod upload;

pub use rangelink_core::{Error, Result};

pub use session::{SessionActor, SessionHandle, SessionStatus};
