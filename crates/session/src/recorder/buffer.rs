use std::collections::VecDeque;
use std::time::Duration;

use super::MediaChunk;

/// Duration-bounded FIFO of recent media chunks.
///
/// Holds at most `window` worth of chunk duration; pushing past the bound
/// evicts oldest-first. The buffer exists for the lifetime of an active
/// stream and is cleared on stream teardown.
#[derive(Debug)]
pub struct RollingBuffer {
    chunks: VecDeque<MediaChunk>,
    buffered: Duration,
    window: Duration,
    evicted: u64,
}

impl RollingBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            chunks: VecDeque::new(),
            buffered: Duration::ZERO,
            window,
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total duration currently buffered.
    pub fn buffered(&self) -> Duration {
        self.buffered
    }

    /// Chunks dropped to stay within the window since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Append a chunk, evicting oldest chunks until the window bound holds
    /// again. A single chunk longer than the whole window is kept alone.
    pub fn push(&mut self, chunk: MediaChunk) {
        self.buffered += chunk.duration;
        self.chunks.push_back(chunk);
        while self.buffered > self.window && self.chunks.len() > 1 {
            if let Some(old) = self.chunks.pop_front() {
                self.buffered -= old.duration;
                self.evicted += 1;
            }
        }
    }

    /// Drain the buffer into an ordered chunk list, oldest first.
    pub fn drain(&mut self) -> Vec<MediaChunk> {
        self.buffered = Duration::ZERO;
        self.chunks.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.buffered = Duration::ZERO;
    }
}
