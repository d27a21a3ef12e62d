// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feishu platform client for Larkbridge.
//!
//! Implements the outbound [`Sender`](larkbridge_core::Sender) capability
//! (token-cached text sends, CardKit streaming cards) and the inbound
//! [`EventSource`](larkbridge_core::EventSource) subscription.

pub mod cardkit;
pub mod client;
pub mod sender;
pub mod ws;

pub use cardkit::CARD_ELEMENT_ID;
pub use client::FeishuClient;
pub use ws::WsEventSource;
