// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Larkbridge relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Larkbridge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values; only `feishu.app_id` and `feishu.app_secret` are required to
/// actually serve.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LarkbridgeConfig {
    /// Process identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat-platform app credentials.
    #[serde(default)]
    pub feishu: FeishuConfig,

    /// AI CLI subprocess settings.
    #[serde(default)]
    pub claude: ClaudeConfig,

    /// Project binding store settings.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Output segmentation and card streaming settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the bridge process.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "larkbridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chat-platform app credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeishuConfig {
    /// App id (`cli_...`). `None` means not configured; serving fails fast.
    #[serde(default)]
    pub app_id: Option<String>,

    /// App secret paired with the app id.
    #[serde(default)]
    pub app_secret: Option<String>,
}

/// AI CLI subprocess configuration.
///
/// `api_key`/`auth_token`/`base_url` are injected into the subprocess
/// environment; the process itself talks to the vendor, not this bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeConfig {
    /// Path or name of the CLI binary.
    #[serde(default = "default_claude_binary")]
    pub binary: String,

    /// Vendor endpoint override passed as `ANTHROPIC_BASE_URL`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Passed as `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Passed as `ANTHROPIC_AUTH_TOKEN`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            binary: default_claude_binary(),
            base_url: None,
            api_key: None,
            auth_token: None,
        }
    }
}

fn default_claude_binary() -> String {
    "claude".to_string()
}

/// Project binding store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Path of the persisted chat->directory bindings file.
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Directory scanned by the `ls` command. The `BASE_DIR` environment
    /// variable overrides this value.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            base_dir: default_base_dir(),
        }
    }
}

fn default_config_file() -> String {
    "~/.feishu-bot/projects.json".to_string()
}

fn default_base_dir() -> String {
    "~/Desktop/code".to_string()
}

/// Output segmentation and card streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Seconds without a new delta before the buffer is flushed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds of continuous output before a forced flush.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Maximum buffered code points before a forced flush. Kept below the
    /// platform's ~150 KB message cap.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,

    /// Minimum milliseconds between card content updates (2 QPS hard
    /// platform limit at 500 ms).
    #[serde(default = "default_card_rate_limit_ms")]
    pub card_rate_limit_ms: u64,

    /// Deliver replies on a live-updating streaming card instead of plain
    /// text messages.
    #[serde(default)]
    pub card_mode: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_duration_secs: default_max_duration_secs(),
            max_buffer_size: default_max_buffer_size(),
            card_rate_limit_ms: default_card_rate_limit_ms(),
            card_mode: false,
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    8
}

fn default_max_duration_secs() -> u64 {
    20
}

fn default_max_buffer_size() -> usize {
    30_000
}

fn default_card_rate_limit_ms() -> u64 {
    500
}
