//! Local camera acquisition.
//!
//! The orchestrator never touches device APIs directly; a [`CaptureSource`]
//! turns acquisition hints into a [`CaptureStream`] of encoded chunks and,
//! when a pose model is loaded, per-frame pose estimates. Acquisition
//! failure leaves the stream unset rather than crashing the session, and a
//! missing pose model only disables the automatic gesture trigger.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use rangelink_core::config::{CaptureConfig, RecorderConfig};
use rangelink_core::{Error, Result};

use crate::gesture::PoseFrame;
use crate::recorder::MediaChunk;
use crate::session::SessionHandle;

/// An open camera stream.
#[derive(Debug)]
pub struct CaptureStream {
    /// Encoded media chunks at the recorder cadence.
    pub chunks: mpsc::UnboundedReceiver<MediaChunk>,
    /// Pose estimates, absent when the pose model failed to load. The
    /// session then runs with manual triggers only.
    pub poses: Option<mpsc::UnboundedReceiver<PoseFrame>>,
    producer: Option<JoinHandle<()>>,
}

impl CaptureStream {
    pub fn new(
        chunks: mpsc::UnboundedReceiver<MediaChunk>,
        poses: Option<mpsc::UnboundedReceiver<PoseFrame>>,
        producer: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            chunks,
            poses,
            producer,
        }
    }

    /// Stop producing. Safe to call once receivers are drained or dropped.
    pub fn close(&mut self) {
        if let Some(task) = self.producer.take() {
            task.abort();
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens camera streams from acquisition hints.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn open(&self, capture: &CaptureConfig, recorder: &RecorderConfig)
        -> Result<CaptureStream>;
}

/// Pump an open stream into a session until either side goes away.
pub fn attach(mut stream: CaptureStream, handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pose_task = stream.poses.take().map(|mut rx| {
            let handle = handle.clone();
            tokio::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    if handle.pose(frame).is_err() {
                        break;
                    }
                }
            })
        });
        while let Some(chunk) = stream.chunks.recv().await {
            if handle.chunk(chunk).is_err() {
                break;
            }
        }
        if let Some(task) = pose_task {
            task.abort();
        }
        stream.close();
    })
}

/// Capture source that synthesizes sequentially numbered chunks at the
/// recorder cadence. Stands in for a real camera in tests and local runs.
#[derive(Debug, Default)]
pub struct SyntheticCapture {
    /// Simulate a denied or absent camera.
    pub fail_acquisition: bool,
    /// Simulate the pose model failing to load.
    pub without_pose_model: bool,
}

#[async_trait]
impl CaptureSource for SyntheticCapture {
    async fn open(
        &self,
        capture: &CaptureConfig,
        recorder: &RecorderConfig,
    ) -> Result<CaptureStream> {
        if self.fail_acquisition {
            return Err(Error::MediaAcquisitionFailed(
                "camera denied or absent".to_string(),
            ));
        }
        info!(
            width = capture.width,
            height = capture.height,
            frame_rate = capture.frame_rate,
            "opening synthetic capture"
        );

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let interval = recorder.chunk_interval();
        let chunk_bytes = (capture.width * capture.height / 256) as usize;
        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so chunk 0
            // lands one full interval after open.
            ticker.tick().await;
            let mut seq = 0u64;
            loop {
                ticker.tick().await;
                let chunk = MediaChunk::new(seq, Bytes::from(vec![0u8; chunk_bytes]), interval);
                if chunk_tx.send(chunk).is_err() {
                    break;
                }
                seq += 1;
            }
        });

        let poses = if self.without_pose_model {
            None
        } else {
            // Synthetic capture has no detector; it exposes an idle pose
            // channel a test harness can hold open.
            let (_tx, rx) = mpsc::unbounded_channel();
            Some(rx)
        };

        Ok(CaptureStream::new(chunk_rx, poses, Some(producer)))
    }
}
