// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound capability trait for the chat platform.
//!
//! The relay pipeline only ever needs three outbound operations, so they
//! are an explicit capability set rather than being discovered at runtime:
//! plain text sends, streaming-card creation, and sequenced card content
//! updates.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{CardHandle, ReplyTarget};

/// Outbound message delivery to the chat platform.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Verifies a tenant access token can be obtained (or is cached).
    ///
    /// The relay calls this before spawning a subprocess so that an auth
    /// failure surfaces as a user-visible error up front instead of a
    /// dropped reply at flush time.
    async fn ensure_authenticated(&self) -> Result<(), BridgeError>;

    /// Sends one plain text message to the target.
    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<(), BridgeError>;

    /// Creates a streaming card and posts it to the target as an
    /// interactive message. Returns the handle used for content updates.
    async fn create_card(
        &self,
        target: &ReplyTarget,
        title: &str,
        placeholder: &str,
    ) -> Result<CardHandle, BridgeError>;

    /// Replaces the card's element content at the given sequence.
    ///
    /// `content` is the full cumulative text, not a delta. Returns the
    /// server-confirmed sequence, which is authoritative; a rejection
    /// carrying the server's expected sequence surfaces as
    /// [`BridgeError::StaleSequence`].
    async fn update_card(
        &self,
        card: &CardHandle,
        content: &str,
        sequence: i64,
    ) -> Result<i64, BridgeError>;
}

/// A long-lived subscription delivering raw inbound platform events.
///
/// The platform SDK's transport is an external collaborator; the gateway
/// only depends on this seam. Each event is the platform's JSON envelope.
#[async_trait]
pub trait EventSource: Send {
    /// Establishes the subscription.
    async fn connect(&mut self) -> Result<(), BridgeError>;

    /// Waits for the next inbound event.
    async fn next_event(&mut self) -> Result<serde_json::Value, BridgeError>;
}
