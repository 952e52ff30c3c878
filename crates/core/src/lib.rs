//! RangeLink core types
//!
//! Transport-agnostic building blocks shared across the orchestrator: the
//! session/round data model, the error taxonomy, and configuration. The
//! session crate layers signaling, the peer link, gesture detection, the
//! rolling recorder, and the upload pipeline on top of these.

pub mod config;
pub mod error;
pub mod model;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use model::{
    PresenceSet, Round, RoundId, RoundStatus, Session, SessionId, UploadResult, UploadTask,
};
