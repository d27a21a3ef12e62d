// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event dispatch.
//!
//! The subscription callback is acknowledged immediately: each event is
//! handled on its own spawned task, with panics recovered and logged so a
//! bad event can never take the process down. Validation, dedup, and
//! chat-mode classification happen on that task, then the event either
//! resolves to an in-chat command reply or is forwarded to the relay.

use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use larkbridge_core::{BridgeError, EventSource, ReplyTarget, Sender};
use larkbridge_relay::{GROUP_SESSION_KEY, Relay, RelayError, RelayRequest};

use crate::commands::{CommandHandler, GroupCommand, parse_group_command};
use crate::dedup::Deduper;
use crate::event::{
    EVENT_BOT_MENU, EVENT_MESSAGE_RECEIVE, EVENT_P2P_CHAT_ENTERED, EventEnvelope, classify_target,
    extract_text, is_mentioned,
};
use crate::trace::{TraceFields, TraceWriter};

const WELCOME_TEXT: &str = "🎉 Welcome to the Claude CLI bridge!\n\n\
    Send any message to start a conversation.\n\n\
    Messages are passed straight to the Claude CLI.";

/// Fixed text for a failed token pre-check.
const TOKEN_FAILURE_TEXT: &str = "❌ Failed to obtain access token";

const CHAT_FAILED_PREFIX: &str = "❌ Chat failed: ";

/// The inbound side of the bridge with its injected collaborators.
pub struct Gateway {
    sender: Arc<dyn Sender>,
    relay: Arc<Relay>,
    commands: CommandHandler,
    dedup: Deduper,
    trace: TraceWriter,
}

impl Gateway {
    pub fn new(
        sender: Arc<dyn Sender>,
        relay: Arc<Relay>,
        commands: CommandHandler,
        dedup: Deduper,
        trace: TraceWriter,
    ) -> Self {
        Self {
            sender,
            relay,
            commands,
            dedup,
            trace,
        }
    }

    /// Runs the subscription loop until cancellation. Each event is
    /// acknowledged by returning to the source immediately and handled on
    /// its own task.
    pub async fn run(
        self: Arc<Self>,
        mut source: Box<dyn EventSource>,
        cancel: CancellationToken,
    ) -> Result<(), BridgeError> {
        source.connect().await?;
        info!("gateway running");

        loop {
            tokio::select! {
                event = source.next_event() => {
                    let raw = match event {
                        Ok(raw) => raw,
                        Err(e) => {
                            error!(error = %e, "event subscription failed");
                            return Err(e);
                        }
                    };
                    self.trace_raw("ws_recv", &raw);

                    let gateway = self.clone();
                    let task_cancel = cancel.clone();
                    tokio::spawn(async move {
                        let handled = std::panic::AssertUnwindSafe(
                            gateway.handle_raw_event(raw, task_cancel),
                        )
                        .catch_unwind()
                        .await;
                        if handled.is_err() {
                            error!("event handler panicked");
                        }
                    });
                }
                _ = cancel.cancelled() => {
                    info!("gateway shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Handles one raw event envelope. Public so tests and the serve loop
    /// drive events without a live subscription.
    pub async fn handle_raw_event(&self, raw: serde_json::Value, cancel: CancellationToken) {
        self.trace_raw("handler_async", &raw);

        let envelope: EventEnvelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "unparseable event envelope");
                return;
            }
        };

        match envelope.event_type() {
            EVENT_MESSAGE_RECEIVE => self.handle_message(envelope, cancel).await,
            EVENT_P2P_CHAT_ENTERED => self.handle_chat_entered(envelope).await,
            EVENT_BOT_MENU => self.handle_menu(envelope).await,
            other => {
                debug!(event_type = other, "ignoring event type");
            }
        }
    }

    async fn handle_message(&self, envelope: EventEnvelope, cancel: CancellationToken) {
        self.trace(&envelope, "handler_enter");

        let Some(kind) = envelope.chat_kind() else {
            warn!("message event without usable chat_type, dropping");
            return;
        };

        // Required fields: sender open id always; chat id for group chats.
        let Some(open_id) = envelope.sender_open_id().map(str::to_string) else {
            warn!("message event missing sender open_id, dropping");
            return;
        };
        let message = envelope.message().cloned().unwrap_or_default();
        if !kind.is_direct() && message.chat_id.is_none() {
            warn!("group message missing chat_id, dropping");
            return;
        }

        // Non-user senders and non-text messages are dropped silently.
        if let Some(sender_type) = envelope.sender_type() {
            let sender_type = sender_type.trim().to_ascii_lowercase();
            if !sender_type.is_empty() && sender_type != "user" {
                debug!(sender_type = sender_type.as_str(), "ignoring non-user sender");
                return;
            }
        }
        if let Some(message_type) = message.message_type.as_deref() {
            let message_type = message_type.trim().to_ascii_lowercase();
            if !message_type.is_empty() && message_type != "text" {
                debug!(message_type = message_type.as_str(), "ignoring non-text message");
                return;
            }
        }

        if let Some(message_id) = message.message_id.as_deref()
            && !message_id.is_empty()
            && self.dedup.is_duplicate(message_id)
        {
            return;
        }

        let text = message
            .content
            .as_deref()
            .map(extract_text)
            .unwrap_or_default();

        let chat_id = message.chat_id.clone().unwrap_or_default();
        let Some(target) = classify_target(kind, &open_id, message.chat_id.as_deref()) else {
            warn!("no usable reply target, dropping");
            return;
        };

        debug!(
            chat_type = %kind,
            chat_id = chat_id.as_str(),
            open_id = open_id.as_str(),
            chars = text.chars().count(),
            "message accepted"
        );

        // Group chats: an @-mention switches into command mode.
        if !kind.is_direct() && is_mentioned(&message) {
            self.handle_command(&target, &chat_id, &text).await;
            return;
        }

        if text.trim().is_empty() {
            debug!("empty message text, dropping");
            return;
        }

        let request = if kind.is_direct() {
            RelayRequest {
                target: target.clone(),
                text,
                session_key: open_id.clone(),
                binding_key: None,
            }
        } else {
            // All group chats share one logical AI conversation.
            RelayRequest {
                target: target.clone(),
                text,
                session_key: GROUP_SESSION_KEY.to_string(),
                binding_key: Some(chat_id),
            }
        };

        // One failure text per failed run, direct chats only; group chat
        // failures are logged without a reply.
        if let Err(e) = self.relay.handle(request, cancel).await {
            error!(error = %e, "relay run failed");
            if kind.is_direct() {
                let failure = match &e {
                    RelayError::Auth(_) => TOKEN_FAILURE_TEXT.to_string(),
                    RelayError::Run(source) => format!("{CHAT_FAILED_PREFIX}{source}"),
                };
                if let Err(send_err) = self.sender.send_text(&target, &failure).await {
                    warn!(error = %send_err, "failed to deliver failure text");
                }
            }
        }
    }

    async fn handle_command(&self, target: &ReplyTarget, chat_id: &str, text: &str) {
        let reply = match parse_group_command(text) {
            GroupCommand::Ls => self.commands.handle_ls(),
            GroupCommand::Bind(arg) => self.commands.handle_bind(chat_id, &arg),
            GroupCommand::Help | GroupCommand::Empty => self.commands.handle_help(chat_id),
            GroupCommand::Unknown(word) => {
                debug!(word = word.as_str(), "unknown group command");
                self.commands.handle_unknown()
            }
        };
        if let Err(e) = self.sender.send_text(target, &reply).await {
            warn!(error = %e, "failed to send command reply");
        }
    }

    async fn handle_chat_entered(&self, envelope: EventEnvelope) {
        let open_id = envelope
            .event
            .as_ref()
            .and_then(|e| e.operator_id.as_ref())
            .and_then(|id| id.open_id.as_deref());
        let Some(open_id) = open_id else {
            debug!("chat-entered event without operator open_id");
            return;
        };
        if let Err(e) = self
            .sender
            .send_text(&ReplyTarget::open_id(open_id), WELCOME_TEXT)
            .await
        {
            warn!(error = %e, "failed to send welcome message");
        }
    }

    async fn handle_menu(&self, envelope: EventEnvelope) {
        let body = envelope.event.as_ref();
        let open_id = body
            .and_then(|e| e.operator.as_ref())
            .and_then(|op| op.operator_id.as_ref())
            .and_then(|id| id.open_id.as_deref());
        let Some(open_id) = open_id else {
            debug!("menu event without operator open_id");
            return;
        };
        // Every menu key currently resolves to help.
        let reply = self.commands.handle_help("");
        if let Err(e) = self
            .sender
            .send_text(&ReplyTarget::open_id(open_id), &reply)
            .await
        {
            warn!(error = %e, "failed to send menu reply");
        }
    }

    fn trace(&self, envelope: &EventEnvelope, tag: &str) {
        let message = envelope.message();
        self.trace.append(
            tag,
            &TraceFields {
                event_id: envelope.event_id(),
                message_id: message.and_then(|m| m.message_id.as_deref()).unwrap_or(""),
                chat_type: message.and_then(|m| m.chat_type.as_deref()).unwrap_or(""),
                open_id: envelope.sender_open_id().unwrap_or(""),
            },
        );
    }

    fn trace_raw(&self, tag: &str, raw: &serde_json::Value) {
        let field = |pointer: &str| raw.pointer(pointer).and_then(|v| v.as_str()).unwrap_or("");
        self.trace.append(
            tag,
            &TraceFields {
                event_id: field("/header/event_id"),
                message_id: field("/event/message/message_id"),
                chat_type: field("/event/message/chat_type"),
                open_id: field("/event/sender/sender_id/open_id"),
            },
        );
    }
}
