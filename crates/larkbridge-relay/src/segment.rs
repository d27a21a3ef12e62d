// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-based output segmentation.
//!
//! The AI emits hundreds of small deltas per second while the chat
//! platform rate-limits and charges per message. The segmenter converts
//! the high-rate snapshot stream into a low-rate chunk stream without
//! losing characters: it accumulates the code-point increment of each
//! snapshot and flushes on one of three triggers (buffer size, idle
//! timeout, max duration). Closing the snapshot channel finalizes the
//! run: timers stop and the remaining buffer goes out as one last chunk.
//!
//! All accounting is in code points, not bytes, so multi-byte text can
//! never be split mid-character.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Flush thresholds for one segmenter run.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Flush the whole buffer after this long without a new delta.
    pub idle_timeout: Duration,
    /// Flush the whole buffer this long after it first became non-empty,
    /// even if deltas are still arriving.
    pub max_duration: Duration,
    /// Slice off a chunk of exactly this many code points whenever the
    /// buffer reaches it (kept below the platform's ~150 KB message cap).
    pub max_buffer_size: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(8),
            max_duration: Duration::from_secs(20),
            max_buffer_size: 30_000,
        }
    }
}

/// Converts full-text snapshots into ordered chunks.
pub struct Segmenter {
    config: SegmentConfig,
    buffer: Vec<char>,
    /// Code-point count of the last absorbed snapshot; snapshots not
    /// longer than this are duplicates and dropped.
    last_full_len: usize,
}

impl Segmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            last_full_len: 0,
        }
    }

    /// Runs until the snapshot channel closes, delivering chunks in strict
    /// buffer-position order. Returns when finalization is complete or the
    /// chunk receiver goes away.
    pub async fn run(mut self, mut snapshots: mpsc::Receiver<String>, chunks: mpsc::Sender<String>) {
        // Sentinel deadline far enough out to never fire.
        const FAR: Duration = Duration::from_secs(86_400);

        let mut idle_deadline: Option<Instant> = None;
        let mut duration_deadline: Option<Instant> = None;

        loop {
            let idle_at = idle_deadline.unwrap_or_else(|| Instant::now() + FAR);
            let duration_at = duration_deadline.unwrap_or_else(|| Instant::now() + FAR);

            tokio::select! {
                maybe = snapshots.recv() => match maybe {
                    Some(snapshot) => {
                        if !self.absorb(&snapshot) {
                            continue;
                        }
                        // Size trigger: slice off full chunks until under
                        // the limit; the remainder stays buffered.
                        while self.buffer.len() >= self.config.max_buffer_size {
                            let chunk: String =
                                self.buffer.drain(..self.config.max_buffer_size).collect();
                            debug!(len = self.config.max_buffer_size, "size flush");
                            if chunks.send(chunk).await.is_err() {
                                return;
                            }
                        }
                        let now = Instant::now();
                        idle_deadline = Some(now + self.config.idle_timeout);
                        if self.buffer.is_empty() {
                            duration_deadline = None;
                        } else if duration_deadline.is_none() {
                            // Started on the empty -> non-empty transition,
                            // not reset by later deltas.
                            duration_deadline = Some(now + self.config.max_duration);
                        }
                    }
                    None => {
                        // Finalization: cancel timers, flush the remainder.
                        if !self.buffer.is_empty() {
                            let chunk: String = self.buffer.drain(..).collect();
                            debug!(len = chunk.chars().count(), "final flush");
                            let _ = chunks.send(chunk).await;
                        }
                        return;
                    }
                },
                _ = sleep_until(idle_at), if idle_deadline.is_some() => {
                    debug!(len = self.buffer.len(), "idle flush");
                    if !self.flush(&chunks).await {
                        return;
                    }
                    idle_deadline = None;
                    duration_deadline = None;
                }
                _ = sleep_until(duration_at), if duration_deadline.is_some() => {
                    debug!(len = self.buffer.len(), "max-duration flush");
                    if !self.flush(&chunks).await {
                        return;
                    }
                    idle_deadline = None;
                    duration_deadline = None;
                }
            }
        }
    }

    /// Appends the snapshot's new code points. Returns false for
    /// duplicates (snapshot not longer than what was already absorbed).
    fn absorb(&mut self, snapshot: &str) -> bool {
        let count = snapshot.chars().count();
        if count <= self.last_full_len {
            debug!(
                new_len = count,
                last_len = self.last_full_len,
                "dropping duplicate snapshot"
            );
            return false;
        }
        self.buffer
            .extend(snapshot.chars().skip(self.last_full_len));
        self.last_full_len = count;
        true
    }

    /// Sends the entire buffer as one chunk. Returns false if the chunk
    /// receiver is gone.
    async fn flush(&mut self, chunks: &mpsc::Sender<String>) -> bool {
        if self.buffer.is_empty() {
            return true;
        }
        let chunk: String = self.buffer.drain(..).collect();
        chunks.send(chunk).await.is_ok()
    }
}
