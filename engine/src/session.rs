//! Process-backed UCI engine session.
//!
//! Owns exactly one engine subprocess. All exchanges are serialized: a
//! request is written, then stdout is drained until the matching terminator
//! (`uciok`, `readyok`, `bestmove`) arrives or a timeout fires.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::uci::{parse_uci_message, UciError, UciMessage};
use crate::{Analysis, EngineError, EngineSession, StartError};

/// Configuration for a UCI engine session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threads: u32,
    pub handshake_timeout: Duration,
    pub analyze_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            handshake_timeout: Duration::from_secs(10),
            analyze_timeout: Duration::from_secs(120),
        }
    }
}

/// Grace period for the engine to exit after `quit`, and for draining a
/// stopped search after a timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const RESYNC_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    alive: bool,
    analyze_timeout: Duration,
}

impl UciEngine {
    /// Spawn the engine binary and perform the UCI handshake.
    #[tracing::instrument(level = "info", skip(config))]
    pub async fn start(path: &Path, config: &EngineConfig) -> Result<Self, StartError> {
        tracing::info!(
            "Starting engine: {} (threads={})",
            path.display(),
            config.threads
        );
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StartError::Spawn {
                path: path.display().to_string(),
                source,
            })?;

        let stdin = process.stdin.take().ok_or(StartError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(StartError::NoStdout)?;

        let mut session = Self {
            process,
            stdin,
            lines: BufReader::new(stdout).lines(),
            alive: true,
            analyze_timeout: config.analyze_timeout,
        };

        session.send_line("uci").await?;
        session
            .wait_handshake(config.handshake_timeout, |msg| {
                matches!(msg, UciMessage::UciOk)
            })
            .await?;

        // Threads is universal enough to set unconditionally; engines that
        // reject it just ignore the line.
        session
            .send_line(&format!(
                "setoption name Threads value {}",
                config.threads.max(1)
            ))
            .await?;
        session.send_line("isready").await?;
        session
            .wait_handshake(config.handshake_timeout, |msg| {
                matches!(msg, UciMessage::ReadyOk)
            })
            .await?;

        tracing::info!("Engine handshake complete");
        Ok(session)
    }

    async fn send_line(&mut self, cmd: &str) -> std::io::Result<()> {
        tracing::trace!("UCI >> {}", cmd);
        self.stdin.write_all(cmd.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    /// Drain stdout until a message satisfies `pred`, within `limit`.
    async fn wait_handshake(
        &mut self,
        limit: Duration,
        pred: fn(&UciMessage) -> bool,
    ) -> Result<(), StartError> {
        let lines = &mut self.lines;
        let wait = tokio::time::timeout(limit, async {
            loop {
                match lines.next_line().await? {
                    Some(line) => {
                        let trimmed = line.trim();
                        tracing::trace!("UCI << {}", trimmed);
                        if let Ok(msg) = parse_uci_message(trimmed) {
                            if pred(&msg) {
                                return Ok(());
                            }
                        }
                    }
                    None => return Err(StartError::HandshakeEof),
                }
            }
        })
        .await;

        match wait {
            Ok(result) => result,
            Err(_) => Err(StartError::HandshakeTimeout),
        }
    }

    /// Drain stdout until `bestmove`, folding `info` lines into one result.
    async fn collect_analysis(&mut self) -> Result<Analysis, EngineError> {
        let mut analysis = Analysis::default();
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    tracing::trace!("UCI << {}", trimmed);
                    match parse_uci_message(trimmed) {
                        Ok(UciMessage::Info(info)) => analysis.merge(info),
                        Ok(UciMessage::BestMove { .. }) => return Ok(analysis),
                        Ok(_) => continue,
                        Err(UciError::MalformedMessage(msg)) => {
                            return Err(EngineError::MalformedResponse(msg))
                        }
                        // Banners and chatter between searches are harmless.
                        Err(UciError::UnknownMessage(_)) => continue,
                    }
                }
                Ok(None) => {
                    tracing::warn!("Engine stdout EOF mid-search");
                    return Err(EngineError::Crashed);
                }
                Err(e) => {
                    tracing::error!("Error reading engine stdout: {}", e);
                    return Err(EngineError::Crashed);
                }
            }
        }
    }

    /// After a timed-out search: stop it and prove the engine still answers.
    /// Failure to resynchronize marks the session dead.
    async fn resync(&mut self) {
        if self.send_line("stop").await.is_err() {
            self.alive = false;
            return;
        }

        let lines = &mut self.lines;
        let drained = tokio::time::timeout(RESYNC_TIMEOUT, async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().starts_with("bestmove") {
                            return true;
                        }
                    }
                    _ => return false,
                }
            }
        })
        .await;

        if !matches!(drained, Ok(true)) {
            tracing::warn!("Engine failed to resynchronize after timeout, marking dead");
            self.alive = false;
        }
    }
}

impl EngineSession for UciEngine {
    async fn analyze(&mut self, fen: &str, depth: u32) -> Result<Analysis, EngineError> {
        if !self.alive {
            return Err(EngineError::Crashed);
        }

        if self.send_line(&format!("position fen {}", fen)).await.is_err()
            || self.send_line(&format!("go depth {}", depth)).await.is_err()
        {
            self.alive = false;
            return Err(EngineError::Crashed);
        }

        match tokio::time::timeout(self.analyze_timeout, self.collect_analysis()).await {
            Ok(Ok(analysis)) => Ok(analysis),
            Ok(Err(e)) => {
                // A crash or protocol garbage leaves the session in an
                // unknown state; refuse further requests.
                self.alive = false;
                Err(e)
            }
            Err(_) => {
                tracing::warn!("Engine analysis timed out after {:?}", self.analyze_timeout);
                self.resync().await;
                Err(EngineError::Timeout(self.analyze_timeout))
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn stop(&mut self) {
        if self.alive {
            let _ = self.send_line("quit").await;
        }
        self.alive = false;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}
