// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Larkbridge - a bidirectional bridge between Feishu chats and a local
//! Claude CLI.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Larkbridge - relay Feishu chats to a local Claude CLI.
#[derive(Parser, Debug)]
#[command(name = "larkbridge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bridge: subscribe to chat events and relay them.
    Serve,
    /// Print the resolved configuration (secrets redacted).
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match larkbridge_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Config => {
            print_config(&config);
        }
    }
}

/// Prints the resolved configuration with secrets masked.
fn print_config(config: &larkbridge_config::LarkbridgeConfig) {
    println!("agent.name            = {}", config.agent.name);
    println!("agent.log_level       = {}", config.agent.log_level);
    println!(
        "feishu.app_id         = {}",
        config.feishu.app_id.as_deref().unwrap_or("(unset)")
    );
    println!(
        "feishu.app_secret     = {}",
        mask(config.feishu.app_secret.as_deref())
    );
    println!("claude.binary         = {}", config.claude.binary);
    println!(
        "claude.base_url       = {}",
        config.claude.base_url.as_deref().unwrap_or("(default)")
    );
    println!(
        "claude.api_key        = {}",
        mask(config.claude.api_key.as_deref())
    );
    println!(
        "claude.auth_token     = {}",
        mask(config.claude.auth_token.as_deref())
    );
    println!("project.config_file   = {}", config.project.config_file);
    println!("project.base_dir      = {}", config.project.base_dir);
    println!("stream.idle_timeout   = {}s", config.stream.idle_timeout_secs);
    println!("stream.max_duration   = {}s", config.stream.max_duration_secs);
    println!("stream.max_buffer     = {}", config.stream.max_buffer_size);
    println!("stream.card_rate      = {}ms", config.stream.card_rate_limit_ms);
    println!("stream.card_mode      = {}", config.stream.card_mode);
}

fn mask(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "********",
        _ => "(unset)",
    }
}
