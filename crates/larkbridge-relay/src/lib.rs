// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay pipeline for Larkbridge.
//!
//! Converts one inbound user message into one AI subprocess run, with the
//! subprocess's streamed output time-segmented back into chat messages or
//! a live-updating streaming card.

pub mod card;
pub mod relay;
pub mod segment;
pub mod sessions;

pub use card::CardStream;
pub use relay::{OutputMode, Relay, RelayError, RelayRequest, RelaySettings};
pub use segment::{SegmentConfig, Segmenter};
pub use sessions::{GROUP_SESSION_KEY, SessionMap};
