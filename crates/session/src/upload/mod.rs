//! Recording upload and round-progress reconciliation.
//!
//! Uploading is a one-shot submit: the processing service acknowledges
//! receipt synchronously, then transcodes server-side and reports progress
//! out of band on the real-time channel. The [`UploadLedger`] folds those
//! events back into per-round [`UploadTask`] state.

mod http;

pub use http::HttpUploader;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use rangelink_core::model::{RoundId, UploadResult, UploadTask};
use rangelink_core::Result;

use crate::recorder::FinalizedRecording;

/// Submits finalized recordings to the processing service.
///
/// Failure is reported, not retried here; retry policy belongs to the
/// caller.
#[async_trait]
pub trait VideoUploader: Send + Sync {
    /// Submit one recording for the given round. Returns once the service
    /// acknowledges receipt; processing completes asynchronously.
    async fn upload_pose_video(&self, round_id: &RoundId, recording: &FinalizedRecording)
        -> Result<()>;

    /// Ask the service to re-run processing for a round that ended up in a
    /// failure state.
    async fn retry_processing(&self, round_id: &RoundId) -> Result<()>;
}

/// Tracks every upload the session has started, reconciling out-of-band
/// progress and completion events into task state.
#[derive(Debug, Default)]
pub struct UploadLedger {
    tasks: HashMap<RoundId, UploadTask>,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new upload at zero progress.
    pub fn begin(&mut self, round_id: RoundId, started_at_ms: i64) {
        self.tasks
            .entry(round_id.clone())
            .or_insert_with(|| UploadTask::new(round_id, started_at_ms));
    }

    /// Apply a progress observation for a round. Events for unknown rounds
    /// are dropped; events after a terminal result are ignored.
    pub fn on_progress(&mut self, round_id: &str, pct: u8) {
        match self.tasks.get_mut(round_id) {
            Some(task) => task.observe_progress(pct),
            None => debug!(round_id, pct, "progress for unknown round, dropping"),
        }
    }

    /// Mark a round's upload done. At most one completion takes effect.
    pub fn on_done(&mut self, round_id: &str) {
        match self.tasks.get_mut(round_id) {
            Some(task) => task.complete(),
            None => debug!(round_id, "done event for unknown round, dropping"),
        }
    }

    /// Mark a round's upload failed, unless already terminal.
    pub fn on_failed(&mut self, round_id: &str) {
        match self.tasks.get_mut(round_id) {
            Some(task) if task.result.is_none() => {
                warn!(round_id, "upload failed");
                task.result = Some(UploadResult::Failed);
            }
            Some(_) => {}
            None => debug!(round_id, "failure for unknown round, dropping"),
        }
    }

    pub fn get(&self, round_id: &str) -> Option<&UploadTask> {
        self.tasks.get(round_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_per_round() {
        let mut ledger = UploadLedger::new();
        ledger.begin("r1".to_string(), 0);
        ledger.on_progress("r1", 40);
        ledger.on_progress("r1", 25);
        assert_eq!(ledger.get("r1").unwrap().progress, 40);
    }

    #[test]
    fn done_is_terminal_and_at_most_once() {
        let mut ledger = UploadLedger::new();
        ledger.begin("r1".to_string(), 0);
        ledger.on_done("r1");
        let task = ledger.get("r1").unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.result, Some(UploadResult::Done));

        ledger.on_progress("r1", 10);
        ledger.on_failed("r1");
        let task = ledger.get("r1").unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.result, Some(UploadResult::Done));
    }

    #[test]
    fn failure_sticks_but_does_not_override_done() {
        let mut ledger = UploadLedger::new();
        ledger.begin("r1".to_string(), 0);
        ledger.on_failed("r1");
        assert_eq!(ledger.get("r1").unwrap().result, Some(UploadResult::Failed));
        ledger.on_done("r1");
        assert_eq!(ledger.get("r1").unwrap().result, Some(UploadResult::Failed));
    }

    #[test]
    fn events_for_unknown_rounds_are_dropped() {
        let mut ledger = UploadLedger::new();
        ledger.on_progress("ghost", 50);
        ledger.on_done("ghost");
        assert!(ledger.is_empty());
    }

    #[test]
    fn begin_twice_keeps_the_original_task() {
        let mut ledger = UploadLedger::new();
        ledger.begin("r1".to_string(), 111);
        ledger.on_progress("r1", 30);
        ledger.begin("r1".to_string(), 999);
        let task = ledger.get("r1").unwrap();
        assert_eq!(task.started_at_ms, 111);
        assert_eq!(task.progress, 30);
    }
}
