// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Larkbridge relay.

use thiserror::Error;

/// The primary error type used across all Larkbridge crates.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (missing credentials, invalid TOML, bad paths).
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat-platform API errors carrying the platform's error code
    /// (e.g. 230002 when sending a card to a chat the bot is not in).
    #[error("platform error (code {code}): {message}")]
    Platform { code: i64, message: String },

    /// A card content update was rejected because the server already holds
    /// a newer sequence. The next update must use `expected`.
    #[error("stale card sequence, server expects {expected}")]
    StaleSequence { expected: i64 },

    /// Transport-level failures (HTTP, WebSocket).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI subprocess errors (spawn failure, broken pipes, abnormal exit).
    #[error("subprocess error: {0}")]
    Subprocess(String),

    /// Project binding errors (nonexistent path, not a directory).
    #[error("binding error: {0}")]
    Binding(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
