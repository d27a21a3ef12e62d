// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./larkbridge.toml` > `~/.config/larkbridge/larkbridge.toml`
//! > `/etc/larkbridge/larkbridge.toml` with environment variable overrides
//! via the `LARKBRIDGE_` prefix and the legacy flat keys (`FEISHU_APP_ID`,
//! `BASE_DIR`, ...). Environment variables always win over files.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LarkbridgeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/larkbridge/larkbridge.toml` (system-wide)
/// 3. `~/.config/larkbridge/larkbridge.toml` (user XDG config)
/// 4. `./larkbridge.toml` (local directory)
/// 5. `LARKBRIDGE_*` environment variables
/// 6. Legacy flat environment variables (`FEISHU_APP_ID`, `BASE_DIR`, ...)
pub fn load_config() -> Result<LarkbridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LarkbridgeConfig::default()))
        .merge(Toml::file("/etc/larkbridge/larkbridge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("larkbridge/larkbridge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("larkbridge.toml"))
        .merge(env_provider())
        .merge(legacy_env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<LarkbridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LarkbridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LarkbridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LarkbridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(legacy_env_provider())
        .extract()
}

/// Create the `LARKBRIDGE_`-prefixed environment provider.
///
/// Uses explicit `map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `LARKBRIDGE_FEISHU_APP_ID` must map to
/// `feishu.app_id`, not `feishu.app.id`.
fn env_provider() -> Env {
    Env::prefixed("LARKBRIDGE_").map(|key| {
        // `key` is the env var name with the prefix stripped.
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("feishu_", "feishu.", 1)
            .replacen("claude_", "claude.", 1)
            .replacen("project_", "project.", 1)
            .replacen("stream_", "stream.", 1);
        mapped.into()
    })
}

/// Map the legacy flat environment keys recognized by the original bot
/// onto config paths. These are merged last, so env wins over any file
/// setting (this is the documented precedence for `BASE_DIR`).
fn legacy_env_provider() -> Env {
    Env::raw()
        .only(&[
            "FEISHU_APP_ID",
            "FEISHU_APP_SECRET",
            "ANTHROPIC_API_KEY",
            "ANTHROPIC_AUTH_TOKEN",
            "ANTHROPIC_BASE_URL",
            "PROJECT_CONFIG_FILE",
            "LOG_LEVEL",
            "BASE_DIR",
        ])
        .map(|key| {
            let lowered = key.as_str().to_ascii_lowercase();
            let mapped = match lowered.as_str() {
                "feishu_app_id" => "feishu.app_id",
                "feishu_app_secret" => "feishu.app_secret",
                "anthropic_api_key" => "claude.api_key",
                "anthropic_auth_token" => "claude.auth_token",
                "anthropic_base_url" => "claude.base_url",
                "project_config_file" => "project.config_file",
                "log_level" => "agent.log_level",
                "base_dir" => "project.base_dir",
                other => other,
            };
            mapped.to_string().into()
        })
}
