// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock [`Sender`] for deterministic testing.
//!
//! Captures sent texts and card updates for assertion, with injectable
//! authentication failure and a notifier so tests can await deliveries
//! instead of sleeping.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use larkbridge_core::{BridgeError, CardHandle, ReplyTarget, Sender};

/// One captured `update_card` call.
#[derive(Debug, Clone)]
pub struct CardUpdate {
    pub content: String,
    pub sequence: i64,
    pub at: Instant,
}

/// A mock chat platform capturing all outbound traffic.
#[derive(Default)]
pub struct MockSender {
    texts: Mutex<Vec<(ReplyTarget, String)>>,
    card_updates: Mutex<Vec<CardUpdate>>,
    cards_created: Mutex<Vec<(ReplyTarget, String, String)>>,
    fail_auth: AtomicBool,
    notify: Notify,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `ensure_authenticated` fail until cleared.
    pub fn set_auth_failure(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    /// All texts sent so far.
    pub fn sent_texts(&self) -> Vec<(ReplyTarget, String)> {
        self.texts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All card updates so far.
    pub fn card_updates(&self) -> Vec<CardUpdate> {
        self.card_updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All cards created so far (target, title, placeholder).
    pub fn cards_created(&self) -> Vec<(ReplyTarget, String, String)> {
        self.cards_created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Waits until at least `count` texts have been sent.
    pub async fn wait_for_texts(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.sent_texts().len() >= count {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[async_trait]
impl Sender for MockSender {
    async fn ensure_authenticated(&self) -> Result<(), BridgeError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(BridgeError::Platform {
                code: 10014,
                message: "mock auth failure".into(),
            });
        }
        Ok(())
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<(), BridgeError> {
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.clone(), text.to_string()));
        self.notify.notify_waiters();
        Ok(())
    }

    async fn create_card(
        &self,
        target: &ReplyTarget,
        title: &str,
        placeholder: &str,
    ) -> Result<CardHandle, BridgeError> {
        self.cards_created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.clone(), title.to_string(), placeholder.to_string()));
        Ok(CardHandle {
            card_id: "mock-card".into(),
            element_id: "content_markdown".into(),
            uuid: "mock-uuid".into(),
            initial_sequence: 0,
        })
    }

    async fn update_card(
        &self,
        _card: &CardHandle,
        content: &str,
        sequence: i64,
    ) -> Result<i64, BridgeError> {
        self.card_updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CardUpdate {
                content: content.to_string(),
                sequence,
                at: Instant::now(),
            });
        self.notify.notify_waiters();
        Ok(sequence)
    }
}
