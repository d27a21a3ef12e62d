// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation-resume state.
//!
//! Maps a relay key to the AI session id reported by its last completed
//! run. Direct chats key by the sender's open id; every group chat shares
//! [`GROUP_SESSION_KEY`], so all group chats continue one logical
//! conversation process-wide.

use std::collections::HashMap;
use std::sync::Mutex;

/// The single relay key shared by all group chats.
pub const GROUP_SESSION_KEY: &str = "global_group_session";

/// Thread-safe relay-key -> session-id map.
#[derive(Debug, Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<String, String>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known session id for the key, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Records the session id for the key. Empty keys or ids are ignored.
    pub fn set(&self, key: &str, session_id: &str) {
        if key.is_empty() || session_id.is_empty() {
            return;
        }
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), session_id.to_string());
    }

    /// Drops the session id for the key (used when a resume is refused).
    pub fn clear(&self, key: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}
