// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound gateway for Larkbridge.
//!
//! Validates, deduplicates, and classifies inbound platform events,
//! routes in-chat control commands, and forwards everything else to the
//! relay pipeline. Each handled event leaves a best-effort trace line for
//! post-hoc debugging.

pub mod commands;
pub mod dedup;
pub mod event;
pub mod gateway;
pub mod trace;

pub use commands::{CommandHandler, GroupCommand, parse_group_command};
pub use dedup::{DEDUP_WINDOW, Deduper};
pub use event::{EventEnvelope, classify_target, extract_text};
pub use gateway::Gateway;
pub use trace::{TraceFields, TraceWriter};
