//! Rolling pre-roll capture.
//!
//! While no recording is open, incoming chunks feed a bounded
//! [`RollingBuffer`] so a late start decision still includes the last few
//! seconds of footage. Opening a recording snapshots the buffer as the
//! head of the chunk list; stopping concatenates everything captured since
//! into one finalized blob.

mod buffer;

pub use buffer::RollingBuffer;

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use rangelink_core::config::RecorderConfig;

/// One encoded media segment as delivered by the capture source.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub seq: u64,
    pub data: Bytes,
    pub duration: Duration,
}

impl MediaChunk {
    pub fn new(seq: u64, data: Bytes, duration: Duration) -> Self {
        Self {
            seq,
            data,
            duration,
        }
    }
}

/// A completed recording window, ready for upload.
#[derive(Debug, Clone)]
pub struct FinalizedRecording {
    pub data: Bytes,
    pub chunk_count: usize,
    pub duration: Duration,
    /// Wall-clock milliseconds at which the recording window opened,
    /// reported to the processing service alongside the blob.
    pub started_at_ms: i64,
}

impl FinalizedRecording {
    /// An empty finalize is possible when stop races start; the upload
    /// pipeline rejects it rather than this type.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Single-owner recorder over the rolling buffer.
///
/// All chunk deliveries and start/stop calls funnel through the session
/// loop, so ordering between a chunk and a start request is whatever order
/// they were queued in; no chunk is lost or double-counted.
#[derive(Debug)]
pub struct RollingRecorder {
    buffer: RollingBuffer,
    active: Option<ActiveRecording>,
}

#[derive(Debug)]
struct ActiveRecording {
    chunks: Vec<MediaChunk>,
    started_at_ms: i64,
}

impl RollingRecorder {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            buffer: RollingBuffer::new(config.buffer_window()),
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    /// Route one incoming chunk: to the open recording if there is one,
    /// otherwise into the rolling buffer.
    pub fn on_chunk(&mut self, chunk: MediaChunk) {
        match &mut self.active {
            Some(rec) => rec.chunks.push(chunk),
            None => self.buffer.push(chunk),
        }
    }

    /// Open a recording window. The current buffer contents become the
    /// head of the chunk list. No-op if a recording is already open.
    pub fn start(&mut self, now_ms: i64) {
        if self.active.is_some() {
            return;
        }
        let preroll = self.buffer.drain();
        debug!(preroll_chunks = preroll.len(), "recording started");
        self.active = Some(ActiveRecording {
            chunks: preroll,
            started_at_ms: now_ms,
        });
    }

    /// Close the recording window and concatenate its chunks. Returns
    /// `None` if no recording was open. Buffer collection resumes
    /// immediately for the next round.
    pub fn stop(&mut self) -> Option<FinalizedRecording> {
        let rec = self.active.take()?;
        let duration: Duration = rec.chunks.iter().map(|c| c.duration).sum();
        let total: usize = rec.chunks.iter().map(|c| c.data.len()).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in &rec.chunks {
            data.extend_from_slice(&chunk.data);
        }
        debug!(
            chunks = rec.chunks.len(),
            bytes = total,
            "recording finalized"
        );
        Some(FinalizedRecording {
            data: data.freeze(),
            chunk_count: rec.chunks.len(),
            duration,
            started_at_ms: rec.started_at_ms,
        })
    }

    /// Drop buffer and any open recording, on stream teardown.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> RollingRecorder {
        RollingRecorder::new(&RecorderConfig::default())
    }

    fn chunk(seq: u64) -> MediaChunk {
        MediaChunk::new(seq, Bytes::from(vec![seq as u8; 8]), Duration::from_secs(1))
    }

    #[test]
    fn start_snapshots_buffer_then_appends() {
        let mut rec = recorder();
        // Overfill the buffer so only the last 5 chunks remain.
        for seq in 0..8 {
            rec.on_chunk(chunk(seq));
        }
        rec.start(1_000);
        for seq in 8..11 {
            rec.on_chunk(chunk(seq));
        }
        let out = rec.stop().unwrap();
        assert_eq!(out.chunk_count, 8);
        assert_eq!(out.duration, Duration::from_secs(8));
        assert_eq!(out.started_at_ms, 1_000);
        // Bytes are the buffered chunks 3..8 followed by live chunks 8..11.
        let expected: Vec<u8> = (3u8..11).flat_map(|s| vec![s; 8]).collect();
        assert_eq!(&out.data[..], &expected[..]);
    }

    #[test]
    fn partial_buffer_start_keeps_exactly_those_chunks() {
        let mut rec = recorder();
        rec.on_chunk(chunk(0));
        rec.on_chunk(chunk(1));
        rec.start(0);
        let out = rec.stop().unwrap();
        assert_eq!(out.chunk_count, 2);
    }

    #[test]
    fn immediate_stop_yields_empty_recording() {
        let mut rec = recorder();
        rec.start(0);
        let out = rec.stop().unwrap();
        assert!(out.is_empty());
        assert_eq!(out.chunk_count, 0);
    }

    #[test]
    fn stop_without_start_is_none() {
        let mut rec = recorder();
        assert!(rec.stop().is_none());
    }

    #[test]
    fn double_start_is_a_noop() {
        let mut rec = recorder();
        rec.on_chunk(chunk(0));
        rec.start(100);
        rec.on_chunk(chunk(1));
        rec.start(500);
        let out = rec.stop().unwrap();
        assert_eq!(out.started_at_ms, 100);
        assert_eq!(out.chunk_count, 2);
    }

    #[test]
    fn buffering_resumes_after_stop() {
        let mut rec = recorder();
        rec.start(0);
        rec.on_chunk(chunk(0));
        rec.stop().unwrap();
        rec.on_chunk(chunk(1));
        assert_eq!(rec.buffered_chunks(), 1);
        assert!(!rec.is_recording());
    }

    #[test]
    fn reset_clears_everything() {
        let mut rec = recorder();
        rec.on_chunk(chunk(0));
        rec.start(0);
        rec.reset();
        assert!(!rec.is_recording());
        assert_eq!(rec.buffered_chunks(), 0);
        assert!(rec.stop().is_none());
    }
}
