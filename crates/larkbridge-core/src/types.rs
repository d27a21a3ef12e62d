// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common chat types shared across the Larkbridge workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of conversation an inbound message belongs to.
///
/// `P2p` is a direct chat with the bot; `Group` and `Private` are
/// multi-member chats and are handled identically downstream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    P2p,
    Group,
    Private,
}

impl ChatKind {
    /// Whether this is a direct (one-on-one) chat with the bot.
    pub fn is_direct(self) -> bool {
        matches!(self, ChatKind::P2p)
    }
}

/// The id-type accompanying a receive id on message-create calls.
///
/// The choice is binding: sending a card to a chat the bot is not a member
/// of fails with platform error 230002, so direct chats always address the
/// sender's open id and group chats always address the chat id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveIdType {
    OpenId,
    ChatId,
}

impl ReceiveIdType {
    /// Wire value used in the `receive_id_type` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiveIdType::OpenId => "open_id",
            ReceiveIdType::ChatId => "chat_id",
        }
    }
}

/// Where a reply should be delivered: a receive id plus its id-type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub id: String,
    pub id_type: ReceiveIdType,
}

impl ReplyTarget {
    /// Reply target for a direct chat, addressed by the sender's open id.
    pub fn open_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            id_type: ReceiveIdType::OpenId,
        }
    }

    /// Reply target for a group chat, addressed by the chat id.
    pub fn chat_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            id_type: ReceiveIdType::ChatId,
        }
    }
}

/// Handle to a streaming card created for one relay run.
///
/// `initial_sequence` is the server-reported starting sequence (0 if the
/// server did not report one); every subsequent content update must carry
/// a strictly larger sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHandle {
    pub card_id: String,
    pub element_id: String,
    pub uuid: String,
    pub initial_sequence: i64,
}
