// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Larkbridge relay.
//!
//! This crate provides the error taxonomy, common chat types, and the
//! outbound/inbound seams (`Sender`, `EventSource`) used throughout the
//! Larkbridge workspace.

pub mod error;
pub mod sender;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BridgeError;
pub use sender::{EventSource, Sender};
pub use types::{CardHandle, ChatKind, ReceiveIdType, ReplyTarget};
