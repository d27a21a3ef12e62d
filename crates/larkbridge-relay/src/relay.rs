// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay pipeline: one user message in, one subprocess run out.
//!
//! Order of operations per run: verify the access token, look up the
//! bound project directory and the resume session id, spawn the CLI
//! wired to a fresh segmenter and emitter, flush and drain all pending
//! sends at completion, then capture the reported session id. A run
//! whose error output contains `No conversation found` while a resume id
//! was passed is retried exactly once without resume; further errors are
//! surfaced as [`RelayError`] for the gateway to report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use larkbridge_claude::{ClaudeRun, LaunchConfig, RunEvent};
use larkbridge_core::{BridgeError, ReplyTarget, Sender};
use larkbridge_project::BindingStore;

use crate::card::CardStream;
use crate::segment::{SegmentConfig, Segmenter};
use crate::sessions::SessionMap;

/// Error substring that marks a refused resume id.
const RESUME_REFUSED_MARKER: &str = "No conversation found";

/// Fallback text when a card run produced no content at all.
const EMPTY_RUN_TEXT: &str = "⚠️ No reply was produced";

/// Relay failures, split by phase so the caller reports each to the user
/// exactly once.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The token pre-check failed; no subprocess was started.
    #[error("token pre-check failed: {0}")]
    Auth(BridgeError),
    /// The run itself failed (subprocess spawn, card creation).
    #[error(transparent)]
    Run(#[from] BridgeError),
}

const CARD_TITLE: &str = "Claude";
const CARD_PLACEHOLDER: &str = "Thinking...";

/// How chunks are delivered back to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One message-create call per chunk.
    Text,
    /// One streaming card per run, updated in place.
    Card,
}

/// Static settings for every relay run.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub binary: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub segment: SegmentConfig,
    pub mode: OutputMode,
    pub card_rate_limit: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            binary: "claude".into(),
            base_url: None,
            api_key: None,
            auth_token: None,
            segment: SegmentConfig::default(),
            mode: OutputMode::Text,
            card_rate_limit: Duration::from_millis(500),
        }
    }
}

/// One inbound message to relay.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target: ReplyTarget,
    pub text: String,
    /// Key into the conversation-resume map (sender open id for direct
    /// chats, [`crate::sessions::GROUP_SESSION_KEY`] for group chats).
    pub session_key: String,
    /// Key into the binding store; `None` for direct chats, which run in
    /// the inherited working directory.
    pub binding_key: Option<String>,
}

struct RunOutcome {
    session_id: Option<String>,
    resume_refused: bool,
}

/// The relay pipeline with its injected collaborators.
pub struct Relay {
    sender: Arc<dyn Sender>,
    sessions: Arc<SessionMap>,
    bindings: Arc<BindingStore>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        sender: Arc<dyn Sender>,
        sessions: Arc<SessionMap>,
        bindings: Arc<BindingStore>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            sender,
            sessions,
            bindings,
            settings,
        }
    }

    /// Relays one user message end to end. Failures are returned, not
    /// reported to the chat; the gateway owns user-visible error texts.
    pub async fn handle(
        &self,
        req: RelayRequest,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        if let Err(e) = self.sender.ensure_authenticated().await {
            error!(error = %e, "token pre-check failed");
            return Err(RelayError::Auth(e));
        }

        let project_dir = req
            .binding_key
            .as_deref()
            .and_then(|key| self.bindings.get(key));
        let resume = self.sessions.get(&req.session_key);

        debug!(
            session_key = req.session_key.as_str(),
            resume = resume.as_deref().unwrap_or(""),
            project_dir = project_dir.as_deref().unwrap_or(""),
            "starting relay run"
        );

        let mut outcome = self
            .run_once(&req, project_dir.clone(), resume.clone(), &cancel)
            .await?;

        if outcome.resume_refused && resume.is_some() {
            info!(
                session_key = req.session_key.as_str(),
                "resume refused, retrying once without resume"
            );
            self.sessions.clear(&req.session_key);
            outcome = self.run_once(&req, project_dir, None, &cancel).await?;
        }

        if let Some(session_id) = outcome.session_id
            && !session_id.is_empty()
        {
            self.sessions.set(&req.session_key, &session_id);
            debug!(
                session_key = req.session_key.as_str(),
                session_id = session_id.as_str(),
                "session recorded"
            );
        }

        Ok(())
    }

    async fn run_once(
        &self,
        req: &RelayRequest,
        project_dir: Option<String>,
        resume: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let had_resume = resume.is_some();
        let launch = LaunchConfig {
            binary: self.settings.binary.clone(),
            project_dir: project_dir.map(PathBuf::from),
            resume_session_id: resume,
            base_url: self.settings.base_url.clone(),
            api_key: self.settings.api_key.clone(),
            auth_token: self.settings.auth_token.clone(),
        };

        let mut run = ClaudeRun::spawn(&launch, &req.text).await?;

        let (snap_tx, snap_rx) = mpsc::channel::<String>(256);
        let (chunk_tx, chunk_rx) = mpsc::channel::<String>(32);
        let seg_task = tokio::spawn(
            Segmenter::new(self.settings.segment.clone()).run(snap_rx, chunk_tx),
        );
        let emit_task = self.spawn_emitter(req.target.clone(), chunk_rx).await?;

        let mut snap_tx = Some(snap_tx);
        let mut resume_refused = false;
        loop {
            tokio::select! {
                maybe = run.recv() => match maybe {
                    Some(RunEvent::TextDelta { full_text, sequence }) => {
                        debug!(sequence, chars = full_text.chars().count(), "text delta");
                        match snap_tx.as_ref() {
                            Some(tx) => {
                                if tx.send(full_text).await.is_err() {
                                    warn!("segmenter stopped before run end");
                                }
                            }
                            None => debug!("dropping delta after completion"),
                        }
                    }
                    Some(RunEvent::Completed { final_text }) => {
                        debug!(chars = final_text.chars().count(), "subprocess completed");
                        // Finalize the segmenter now: the remaining buffer
                        // flushes at message_stop, not at process exit.
                        snap_tx = None;
                    }
                    Some(RunEvent::Error { message }) => {
                        warn!(message = message.as_str(), "subprocess error");
                        if had_resume && message.contains(RESUME_REFUSED_MARKER) {
                            resume_refused = true;
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    info!("relay run cancelled, stopping subprocess");
                    run.shutdown().await;
                    break;
                }
            }
        }

        // Discard events still in flight (cancellation path) so the
        // reader tasks are never blocked on a full channel.
        while run.recv().await.is_some() {}

        // Finalize the segmenter and wait for all pending sends to drain.
        drop(snap_tx);
        if let Err(e) = seg_task.await {
            warn!(error = %e, "segmenter task failed");
        }
        if let Err(e) = emit_task.await {
            warn!(error = %e, "emitter task failed");
        }

        run.wait_for_output().await;
        match run.wait_for_exit().await {
            Ok(status) if !status.success() => {
                warn!(code = status.code().unwrap_or(-1), "subprocess exited abnormally");
            }
            Err(e) => warn!(error = %e, "failed to reap subprocess"),
            _ => {}
        }

        Ok(RunOutcome {
            session_id: run.session_id(),
            resume_refused,
        })
    }

    /// Starts the chunk consumer for this run. In card mode the card is
    /// created up front so a creation failure aborts before any output.
    async fn spawn_emitter(
        &self,
        target: ReplyTarget,
        mut chunks: mpsc::Receiver<String>,
    ) -> Result<JoinHandle<()>, BridgeError> {
        match self.settings.mode {
            OutputMode::Text => {
                let sender = self.sender.clone();
                Ok(tokio::spawn(async move {
                    while let Some(chunk) = chunks.recv().await {
                        if let Err(e) = sender.send_text(&target, &chunk).await {
                            error!(error = %e, "failed to send chunk");
                        }
                    }
                }))
            }
            OutputMode::Card => {
                let card = self
                    .sender
                    .create_card(&target, CARD_TITLE, CARD_PLACEHOLDER)
                    .await?;
                let stream = CardStream::new(
                    self.sender.clone(),
                    card,
                    self.settings.card_rate_limit,
                );
                let sender = self.sender.clone();
                Ok(tokio::spawn(async move {
                    let mut cumulative = String::new();
                    while let Some(chunk) = chunks.recv().await {
                        cumulative.push_str(&chunk);
                        let sequence = stream.next_sequence().await;
                        if let Err(e) = stream.update(&cumulative, sequence).await {
                            // Logged and dropped; later chunks keep trying.
                            warn!(error = %e, "card update failed");
                        }
                    }
                    if cumulative.is_empty() {
                        // Do not leave the card stuck on the placeholder.
                        if let Err(e) = sender.send_text(&target, EMPTY_RUN_TEXT).await {
                            warn!(error = %e, "failed to send empty-run fallback");
                        }
                    } else if let Err(e) = stream.finalize(&cumulative).await {
                        warn!(error = %e, "card finalize failed");
                    }
                }))
            }
        }
    }
}
