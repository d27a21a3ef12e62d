// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-id deduplication over a sliding window.
//!
//! The platform redelivers events (reconnects, slow acks), so a
//! message id must dispatch downstream at most once per window. Entries
//! older than the window are pruned opportunistically on each miss.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Default sliding window.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Mutex-protected message-id -> first-seen map.
#[derive(Debug)]
pub struct Deduper {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Deduper {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the message id was already seen inside the
    /// window. On a miss the id is recorded and stale entries pruned.
    pub fn is_duplicate(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(first_seen) = seen.get(message_id)
            && now.duration_since(*first_seen) < self.window
        {
            debug!(message_id, "duplicate message dropped");
            return true;
        }

        seen.insert(message_id.to_string(), now);
        seen.retain(|_, first_seen| now.duration_since(*first_seen) < self.window);
        false
    }
}

impl Default for Deduper {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW)
    }
}
