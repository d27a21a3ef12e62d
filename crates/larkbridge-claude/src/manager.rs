// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subprocess lifecycle for one CLI run.
//!
//! Spawn with stream-json flags, write the user turn on stdin, close
//! stdin (the CLI's non-interactive mode waits for EOF before
//! processing), then read stdout line by line through the
//! [`StreamAssembler`] and deliver [`RunEvent`]s over a channel. Stderr
//! lines surface as `Error` events and never abort the run.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use larkbridge_core::BridgeError;

use crate::assembler::{RunEvent, StreamAssembler};
use crate::events::{self, CliEvent};

/// Grace period between SIGTERM and a forced kill on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How a CLI run is launched.
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig {
    /// Binary name or path (`claude` by default via config).
    pub binary: String,
    /// Working directory; inherited cwd when unbound.
    pub project_dir: Option<PathBuf>,
    /// Session id for `--resume`.
    pub resume_session_id: Option<String>,
    /// Injected as `ANTHROPIC_BASE_URL`.
    pub base_url: Option<String>,
    /// Injected as `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
    /// Injected as `ANTHROPIC_AUTH_TOKEN`.
    pub auth_token: Option<String>,
}

/// A running CLI subprocess with its typed output stream.
#[derive(Debug)]
pub struct ClaudeRun {
    child: Child,
    events: mpsc::Receiver<RunEvent>,
    session: Arc<Mutex<Option<String>>>,
    stdout_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ClaudeRun {
    /// Spawns the CLI, feeds the user turn, and starts the output readers.
    pub async fn spawn(config: &LaunchConfig, user_message: &str) -> Result<Self, BridgeError> {
        let mut cmd = Command::new(&config.binary);
        cmd.arg("--dangerously-skip-permissions")
            .arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--include-partial-messages")
            .arg("--verbose");
        if let Some(id) = &config.resume_session_id {
            cmd.arg("--resume").arg(id);
        }
        if let Some(dir) = &config.project_dir {
            cmd.current_dir(dir);
        }
        if let Some(url) = &config.base_url {
            cmd.env("ANTHROPIC_BASE_URL", url);
        }
        if let Some(key) = &config.api_key {
            cmd.env("ANTHROPIC_API_KEY", key);
        }
        if let Some(token) = &config.auth_token {
            cmd.env("ANTHROPIC_AUTH_TOKEN", token);
        }
        cmd.env("CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC", "true");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::Subprocess(format!("CLI binary not found: {}", config.binary))
            } else {
                BridgeError::Subprocess(format!("failed to spawn {}: {e}", config.binary))
            }
        })?;

        info!(
            pid = child.id().unwrap_or(0),
            resume = config.resume_session_id.as_deref().unwrap_or(""),
            project_dir = config
                .project_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "subprocess started"
        );

        // Write the single user turn, then close stdin; the CLI does not
        // start processing until it sees EOF.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Subprocess("stdin pipe missing".into()))?;
        stdin
            .write_all(user_message.as_bytes())
            .await
            .map_err(|e| BridgeError::Subprocess(format!("failed to write user turn: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| BridgeError::Subprocess(format!("failed to write user turn: {e}")))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| BridgeError::Subprocess(format!("failed to close stdin: {e}")))?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Subprocess("stdout pipe missing".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Subprocess("stderr pipe missing".into()))?;

        // The resume id is the session until the run reports a fresh one.
        let session = Arc::new(Mutex::new(config.resume_session_id.clone()));
        let (tx, rx) = mpsc::channel(64);

        let stdout_task = {
            let tx = tx.clone();
            let session = session.clone();
            tokio::spawn(async move {
                let mut assembler = StreamAssembler::new();
                let mut lines = BufReader::new(stdout).lines();
                let mut line_count = 0u64;
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            line_count += 1;
                            let trimmed = line.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            match events::parse_line(trimmed) {
                                Some(CliEvent::Error { .. }) => {
                                    let _ = tx
                                        .send(RunEvent::Error {
                                            message: trimmed.to_string(),
                                        })
                                        .await;
                                }
                                Some(ev) => {
                                    for out in assembler.on_event(&ev) {
                                        if tx.send(out).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                None => {
                                    debug!(line = trimmed, "non-JSON output line");
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "stdout read error");
                            break;
                        }
                    }
                }
                if let Some(sid) = assembler.session_id() {
                    *session.lock().unwrap_or_else(|e| e.into_inner()) = Some(sid.to_string());
                }
                for out in assembler.finish() {
                    let _ = tx.send(out).await;
                }
                debug!(lines = line_count, "subprocess output ended");
            })
        };

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = tx
                    .send(RunEvent::Error {
                        message: format!("claude stderr: {line}"),
                    })
                    .await;
            }
        });

        Ok(Self {
            child,
            events: rx,
            session,
            stdout_task: Some(stdout_task),
            stderr_task: Some(stderr_task),
        })
    }

    /// Next output event; `None` after both readers have drained.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Session id for resume: the id reported by this run, or the resume
    /// id it was started with.
    pub fn session_id(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Waits until the stdout parser and stderr reader have exited and all
    /// in-flight events are delivered.
    pub async fn wait_for_output(&mut self) {
        if let Some(task) = self.stdout_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
    }

    /// Waits for the process exit status.
    pub async fn wait_for_exit(&mut self) -> Result<std::process::ExitStatus, BridgeError> {
        self.child
            .wait()
            .await
            .map_err(|e| BridgeError::Subprocess(format!("wait failed: {e}")))
    }

    /// Stops the subprocess: SIGTERM, wait up to 5 seconds, then kill.
    pub async fn shutdown(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is a live child of this process.
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!("subprocess did not exit after SIGTERM, killing");
                let _ = self.child.kill().await;
            }
        }
    }
}
