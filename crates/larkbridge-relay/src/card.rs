// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming-card update loop with rate limiting.
//!
//! Updates serialize through a per-card async mutex that spans both the
//! rate-limit ticker and the HTTP round trip, so ordering and the 2
//! updates/second platform limit are enforced together. The sequence
//! confirmed by the server is authoritative and replaces the local
//! counter after each update; a stale-sequence rejection corrects the
//! counter so the next attempt obeys the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use larkbridge_core::{BridgeError, CardHandle, Sender};

struct CardState {
    sequence: i64,
    ticker: Interval,
}

/// One card's sequenced update stream.
pub struct CardStream {
    sender: Arc<dyn Sender>,
    card: CardHandle,
    state: Mutex<CardState>,
}

impl CardStream {
    /// Wraps a created card. `rate_limit` is the minimum spacing between
    /// content updates (500 ms for the platform's 2 QPS cap).
    pub fn new(sender: Arc<dyn Sender>, card: CardHandle, rate_limit: Duration) -> Self {
        // First tick only after one full interval, so the very first
        // update is also rate limited.
        let mut ticker = interval_at(Instant::now() + rate_limit, rate_limit);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let sequence = card.initial_sequence;
        Self {
            sender,
            card,
            state: Mutex::new(CardState { sequence, ticker }),
        }
    }

    /// The sequence the next update should carry.
    pub async fn next_sequence(&self) -> i64 {
        self.state.lock().await.sequence + 1
    }

    /// PUTs the full cumulative text at the intended sequence.
    ///
    /// Updates at or below the current sequence are skipped (the server
    /// already saw newer content). Errors are returned for logging but
    /// must not abort the run; subsequent updates keep trying.
    pub async fn update(&self, content: &str, sequence: i64) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;

        if sequence <= state.sequence {
            debug!(
                sequence,
                current = state.sequence,
                "skipping stale card update"
            );
            return Ok(());
        }

        // The ticker wait happens inside the lock so updates stay ordered.
        state.ticker.tick().await;

        match self.sender.update_card(&self.card, content, sequence).await {
            Ok(server_seq) => {
                state.sequence = server_seq;
                Ok(())
            }
            Err(BridgeError::StaleSequence { expected }) => {
                warn!(
                    sequence,
                    expected, "card update rejected, adopting server sequence"
                );
                state.sequence = expected - 1;
                Err(BridgeError::StaleSequence { expected })
            }
            Err(e) => Err(e),
        }
    }

    /// Trailing update with the final full text at current + 1.
    pub async fn finalize(&self, content: &str) -> Result<(), BridgeError> {
        if content.trim().is_empty() {
            return Ok(());
        }
        let next = self.next_sequence().await;
        self.update(content, next).await
    }
}
