//! The run controller: the sequential, cancellable driver for one filtering
//! pass. Pulls records, invokes the engine session, applies extraction and
//! normalization, routes output, and publishes progress.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use uuid::Uuid;

use engine::{EngineConfig, EngineError, EngineSession, StartError, UciEngine};

use crate::extract::extract;
use crate::normalize::puzzle_line;
use crate::output::OutputWriter;
use crate::progress::{RunEvent, RunOutcome, RunProgress, RunSummary};
use crate::reader::{count_positions, EpdReader};

/// Everything needed to run one filtering pass.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub engine_path: PathBuf,
    pub output_epd: Option<PathBuf>,
    pub output_json: Option<PathBuf>,
    pub depth: u32,
    pub threads: u32,
    /// Keep only mates in at most this many moves. Must be at least 1.
    pub mate_limit: u32,
    /// Append `sol`/`theme` opcodes to EPD output lines.
    pub add_solution: bool,
    /// Re-slice puzzle solutions to start with the mating side.
    pub fix_move_order: bool,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.mate_limit < 1 {
            return Err(RunError::Config("mate limit must be at least 1".into()));
        }
        if self.depth < 1 {
            return Err(RunError::Config("depth must be at least 1".into()));
        }
        if self.threads < 1 {
            return Err(RunError::Config("threads must be at least 1".into()));
        }
        if self.output_epd.is_none() && self.output_json.is_none() {
            return Err(RunError::Config(
                "at least one output target (EPD or JSON) is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not start engine: {0}")]
    Start(#[from] StartError),
    #[error("engine session failed: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to one in-flight run: cancellation plus the event stream.
pub struct RunHandle {
    pub id: Uuid,
    cancel: Arc<AtomicBool>,
    pub events: mpsc::Receiver<RunEvent>,
    pub join: tokio::task::JoinHandle<Result<RunOutcome, RunError>>,
}

impl RunHandle {
    /// Request cooperative cancellation. Observed between positions, so the
    /// latency bound is one engine call.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// A detached cancellation trigger, usable while the handle's event
    /// stream is being consumed.
    pub fn canceller(&self) -> Canceller {
        Canceller(self.cancel.clone())
    }
}

/// Clonable cancellation trigger for one run.
#[derive(Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Validate the config and launch the pipeline on a background task.
pub fn spawn_run(config: RunConfig) -> Result<RunHandle, RunError> {
    config.validate()?;

    let id = Uuid::new_v4();
    let cancel = Arc::new(AtomicBool::new(false));
    let (events_tx, events) = mpsc::channel(64);

    let flag = cancel.clone();
    let join = tokio::spawn(async move {
        let engine_config = EngineConfig {
            threads: config.threads,
            ..Default::default()
        };
        let engine = UciEngine::start(&config.engine_path, &engine_config).await?;
        run_with_engine(config, engine, flag, events_tx).await
    });

    Ok(RunHandle {
        id,
        cancel,
        events,
        join,
    })
}

/// Drive a validated run with an already-started engine session.
///
/// Public as the seam for scripted engine doubles; production code goes
/// through [`spawn_run`]. The session is stopped exactly once on every exit
/// path, and accumulated output is flushed even when the run fails.
pub async fn run_with_engine<E: EngineSession>(
    config: RunConfig,
    mut engine: E,
    cancel: Arc<AtomicBool>,
    events: mpsc::Sender<RunEvent>,
) -> Result<RunOutcome, RunError> {
    let total = match count_positions(&config.input).await {
        Ok(n) => n,
        Err(e) => {
            // Precount is purely cosmetic; run with an unknown total.
            tracing::warn!("Could not precount positions: {}", e);
            0
        }
    };
    log(&events, format!("Total positions: {}", total)).await;

    let mut reader = match EpdReader::open(&config.input).await {
        Ok(reader) => reader,
        Err(e) => {
            engine.stop().await;
            return Err(e.into());
        }
    };
    let mut writer = match OutputWriter::create(
        config.output_epd.as_deref(),
        config.output_json.clone(),
        config.add_solution,
    )
    .await
    {
        Ok(writer) => writer,
        Err(e) => {
            engine.stop().await;
            return Err(e.into());
        }
    };

    let result = drive(&config, &mut engine, &mut reader, &mut writer, &cancel, &events, total).await;

    engine.stop().await;
    let flushed = writer.finalize().await;

    match result {
        Ok(outcome) => {
            flushed?;
            let summary = outcome.summary();
            log(
                &events,
                format!(
                    "Finished. Processed {}/{}, kept {}. Time: {:.1?}",
                    summary.processed, summary.total, summary.matches, summary.elapsed
                ),
            )
            .await;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(flush_err) = flushed {
                tracing::warn!("Failed to flush output after run error: {}", flush_err);
            }
            log(&events, format!("Run failed: {}", e)).await;
            Err(e)
        }
    }
}

/// The per-position loop. Returns the terminal outcome or a fatal error;
/// resource teardown is the caller's job.
async fn drive<E: EngineSession>(
    config: &RunConfig,
    engine: &mut E,
    reader: &mut EpdReader,
    writer: &mut OutputWriter,
    cancel: &AtomicBool,
    events: &mpsc::Sender<RunEvent>,
    total: u64,
) -> Result<RunOutcome, RunError> {
    let started = Instant::now();
    let mut processed = 0u64;
    let mut matches = 0u64;

    loop {
        // Polled once per position boundary, never mid-engine-call.
        if cancel.load(Ordering::Relaxed) {
            log(events, "Analysis cancelled by user.".to_string()).await;
            return Ok(RunOutcome::Cancelled(summary(
                processed, total, matches, started,
            )));
        }

        let record = match reader.next().await? {
            None => {
                return Ok(RunOutcome::Completed(summary(
                    processed, total, matches, started,
                )))
            }
            Some(Err(parse_err)) => {
                processed += 1;
                tracing::warn!("{}", parse_err);
                log(
                    events,
                    format!("Skipping invalid FEN at line {}", parse_err.line),
                )
                .await;
                publish(events, processed, total, matches, started).await;
                continue;
            }
            Some(Ok(record)) => record,
        };
        processed += 1;

        match engine.analyze(&record.fen, config.depth).await {
            Ok(analysis) => {
                if let Some(mate) = extract(&record.board, &analysis, config.mate_limit) {
                    let puzzle = puzzle_line(&record, &mate, config.fix_move_order);
                    writer.write_epd(&record, &mate).await?;
                    writer.add_puzzle(puzzle, &mate);
                    matches += 1;
                    log(
                        events,
                        format!(
                            "Kept line {}: mate in {}",
                            record.line_number, mate.moves_to_mate
                        ),
                    )
                    .await;
                }
            }
            Err(EngineError::Timeout(limit)) => {
                // One slow position is absorbed; a session that can no
                // longer answer is not.
                log(
                    events,
                    format!(
                        "Engine timed out on line {} (>{:?}), skipping",
                        record.line_number, limit
                    ),
                )
                .await;
                if !engine.is_alive() {
                    return Err(EngineError::Crashed.into());
                }
            }
            Err(e) => {
                log(
                    events,
                    format!("Engine error on line {}: {}", record.line_number, e),
                )
                .await;
                return Err(e.into());
            }
        }

        publish(events, processed, total, matches, started).await;
    }
}

fn summary(processed: u64, total: u64, matches: u64, started: Instant) -> RunSummary {
    RunSummary {
        processed,
        total,
        matches,
        elapsed: started.elapsed(),
    }
}

async fn publish(
    events: &mpsc::Sender<RunEvent>,
    processed: u64,
    total: u64,
    matches: u64,
    started: Instant,
) {
    let snapshot = RunProgress::compute(processed, total, matches, started.elapsed());
    let _ = events.send(RunEvent::Progress(snapshot)).await;
}

async fn log(events: &mpsc::Sender<RunEvent>, line: String) {
    tracing::info!("{}", line);
    // A dropped receiver just means nobody is watching.
    let _ = events.send(RunEvent::Log(line)).await;
}
