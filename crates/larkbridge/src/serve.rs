// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `larkbridge serve` command implementation.
//!
//! Wires the platform client, binding store, conversation state, relay,
//! and gateway together, then runs the event subscription until a
//! shutdown signal arrives. Missing credentials or a failed subscription
//! are startup errors and exit nonzero.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use larkbridge_config::LarkbridgeConfig;
use larkbridge_core::{BridgeError, Sender};
use larkbridge_feishu::{FeishuClient, WsEventSource};
use larkbridge_gateway::{CommandHandler, Deduper, Gateway, TraceWriter};
use larkbridge_project::BindingStore;
use larkbridge_relay::{OutputMode, Relay, RelaySettings, SegmentConfig, SessionMap};

use crate::shutdown;

/// Runs the `larkbridge serve` command.
pub async fn run_serve(config: LarkbridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.agent.log_level);

    info!(name = config.agent.name.as_str(), "starting larkbridge serve");

    let app_id = require(&config.feishu.app_id, "feishu.app_id (FEISHU_APP_ID)")?;
    let app_secret = require(&config.feishu.app_secret, "feishu.app_secret (FEISHU_APP_SECRET)")?;

    let client = Arc::new(FeishuClient::new(app_id.clone(), app_secret.clone())?);

    // One token fetch up front so credential problems surface in the log
    // immediately instead of on the first inbound message.
    match client.tenant_access_token().await {
        Ok(_) => info!("tenant token self-check ok"),
        Err(e) => warn!(error = %e, "tenant token self-check failed"),
    }

    let bindings = Arc::new(BindingStore::open(
        &config.project.config_file,
        &config.project.base_dir,
    )?);
    let sessions = Arc::new(SessionMap::new());

    let settings = RelaySettings {
        binary: config.claude.binary.clone(),
        base_url: config.claude.base_url.clone(),
        api_key: config.claude.api_key.clone(),
        auth_token: config.claude.auth_token.clone(),
        segment: SegmentConfig {
            idle_timeout: Duration::from_secs(config.stream.idle_timeout_secs),
            max_duration: Duration::from_secs(config.stream.max_duration_secs),
            max_buffer_size: config.stream.max_buffer_size,
        },
        mode: if config.stream.card_mode {
            OutputMode::Card
        } else {
            OutputMode::Text
        },
        card_rate_limit: Duration::from_millis(config.stream.card_rate_limit_ms),
    };

    let sender: Arc<dyn Sender> = client.clone();
    let relay = Arc::new(Relay::new(
        sender.clone(),
        sessions,
        bindings.clone(),
        settings,
    ));
    let gateway = Arc::new(Gateway::new(
        sender,
        relay,
        CommandHandler::new(bindings),
        Deduper::default(),
        TraceWriter::in_temp_dir(),
    ));

    let cancel = shutdown::install_signal_handler();
    let source = Box::new(WsEventSource::new(app_id, app_secret));

    let result = gateway.run(source, cancel).await;
    info!("larkbridge serve shutdown complete");
    result
}

fn require(value: &Option<String>, name: &str) -> Result<String, BridgeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(BridgeError::Config(format!("{name} is required"))),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("larkbridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
