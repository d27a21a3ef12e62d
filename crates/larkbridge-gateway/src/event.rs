// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event model and content extraction.
//!
//! Every nested field of the platform's event envelope is optional; the
//! gateway validates defensively instead of trusting the schema.

use serde::Deserialize;

use larkbridge_core::{ChatKind, ReplyTarget};

/// Event type of inbound chat messages.
pub const EVENT_MESSAGE_RECEIVE: &str = "im.message.receive_v1";
/// Event type fired when a user first opens the bot's direct chat.
pub const EVENT_P2P_CHAT_ENTERED: &str = "im.chat.access_event.bot_p2p_chat_entered_v1";
/// Event type of bot menu clicks.
pub const EVENT_BOT_MENU: &str = "application.bot.menu_v6";

/// The platform's outer event envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub header: Option<EventHeader>,
    #[serde(default)]
    pub event: Option<EventBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventHeader {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub sender: Option<EventSender>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    /// Present on chat-entered events.
    #[serde(default)]
    pub operator_id: Option<SenderId>,
    /// Present on menu events.
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub event_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSender {
    #[serde(default)]
    pub sender_id: Option<SenderId>,
    #[serde(default)]
    pub sender_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SenderId {
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub union_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operator {
    #[serde(default)]
    pub operator_id: Option<SenderId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mentions: Vec<serde_json::Value>,
}

impl EventEnvelope {
    pub fn event_id(&self) -> &str {
        self.header
            .as_ref()
            .and_then(|h| h.event_id.as_deref())
            .unwrap_or("")
    }

    pub fn event_type(&self) -> &str {
        self.header
            .as_ref()
            .and_then(|h| h.event_type.as_deref())
            .unwrap_or("")
    }

    pub fn message(&self) -> Option<&EventMessage> {
        self.event.as_ref().and_then(|e| e.message.as_ref())
    }

    pub fn sender_open_id(&self) -> Option<&str> {
        self.event
            .as_ref()
            .and_then(|e| e.sender.as_ref())
            .and_then(|s| s.sender_id.as_ref())
            .and_then(|id| id.open_id.as_deref())
    }

    pub fn sender_type(&self) -> Option<&str> {
        self.event
            .as_ref()
            .and_then(|e| e.sender.as_ref())
            .and_then(|s| s.sender_type.as_deref())
    }

    pub fn chat_kind(&self) -> Option<ChatKind> {
        self.message()
            .and_then(|m| m.chat_type.as_deref())
            .and_then(|t| t.parse().ok())
    }
}

/// Extracts plain text from the message content field: the content is a
/// JSON object with a `text` field; non-JSON content is returned as is.
pub fn extract_text(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => value
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| content.to_string()),
        Err(_) => content.to_string(),
    }
}

/// Picks the reply target for a chat kind: direct chats answer the
/// sender's open id, group chats answer the chat id.
pub fn classify_target(
    kind: ChatKind,
    sender_open_id: &str,
    chat_id: Option<&str>,
) -> Option<ReplyTarget> {
    match kind {
        ChatKind::P2p => Some(ReplyTarget::open_id(sender_open_id)),
        ChatKind::Group | ChatKind::Private => chat_id.map(ReplyTarget::chat_id),
    }
}

/// Whether the bot was @-mentioned in the message.
pub fn is_mentioned(message: &EventMessage) -> bool {
    !message.mentions.is_empty()
}
