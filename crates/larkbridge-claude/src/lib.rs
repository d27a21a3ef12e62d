// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claude CLI subprocess management for Larkbridge.
//!
//! One [`ClaudeRun`] owns one CLI process per relay call: spawn with
//! stream-json flags, feed the user turn on stdin, parse NDJSON output
//! into typed [`RunEvent`]s with monotonic sequence numbers, and await
//! exit. Tool-use events are parsed but cause no action.

pub mod assembler;
pub mod events;
pub mod manager;

pub use assembler::{RunEvent, StreamAssembler};
pub use manager::{ClaudeRun, LaunchConfig};
