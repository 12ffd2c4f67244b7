//! epdmate - filter EPD positions down to forced mates.
//!
//! Streams a (potentially huge) EPD file through one external UCI engine and
//! keeps the positions with a forced mate within a configurable move limit.
//! Survivors go to a filtered EPD file and/or a JSON puzzle document. The
//! analysis runs on a background task; this binary renders its progress/log
//! channel and turns Ctrl-C into a cooperative cancellation request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use pipeline::{spawn_run, RunConfig, RunEvent, RunOutcome, RunProgress};

mod config;

/// Filter EPD positions to those with a forced mate within a move limit.
#[derive(Parser)]
#[command(name = "epdmate", about = "EPD mate filter driven by a UCI engine")]
struct Cli {
    /// Input EPD file, one position per line.
    input: PathBuf,

    /// Write surviving positions to this EPD file.
    #[arg(long, value_name = "PATH")]
    output_epd: Option<PathBuf>,

    /// Write surviving positions to this JSON puzzle file.
    #[arg(long, value_name = "PATH")]
    output_json: Option<PathBuf>,

    /// UCI engine binary (default: $EPDMATE_ENGINE, then `stockfish`).
    #[arg(long, value_name = "PATH")]
    engine: Option<PathBuf>,

    /// Engine search depth (default: $EPDMATE_DEPTH, then 20).
    #[arg(long)]
    depth: Option<u32>,

    /// Engine thread count (default: $EPDMATE_THREADS, then 1).
    #[arg(long)]
    threads: Option<u32>,

    /// Keep only mates in at most this many moves.
    #[arg(long, default_value_t = 3)]
    mate_limit: u32,

    /// Append `sol`/`theme` opcodes with the mate line to EPD output.
    #[arg(long)]
    add_solution: bool,

    /// Re-slice puzzle solutions so they start with the mating side's move.
    #[arg(long)]
    fix_move_order: bool,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let config = RunConfig {
        input: cli.input,
        engine_path: cli.engine.unwrap_or_else(config::get_default_engine),
        output_epd: cli.output_epd,
        output_json: cli.output_json,
        depth: cli.depth.unwrap_or_else(config::get_default_depth),
        threads: cli.threads.unwrap_or_else(config::get_default_threads),
        mate_limit: cli.mate_limit,
        add_solution: cli.add_solution,
        fix_move_order: cli.fix_move_order,
    };

    let mut handle = spawn_run(config)?;
    tracing::debug!(run_id = %handle.id, "Run spawned");

    let canceller = handle.canceller();
    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(RunEvent::Log(line)) => println!("{}", line),
                Some(RunEvent::Progress(progress)) => render_progress(&progress),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                tracing::info!("Cancellation requested, finishing current position");
                canceller.cancel();
            }
        }
    }

    match handle.join.await.context("analysis task panicked")? {
        Ok(RunOutcome::Completed(_)) => Ok(()),
        Ok(RunOutcome::Cancelled(summary)) => {
            println!(
                "Cancelled. Processed {}/{}, kept {}.",
                summary.processed, summary.total, summary.matches
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn render_progress(progress: &RunProgress) {
    let eta = match progress.eta {
        Some(eta) => format_duration(eta),
        None => "--:--:--".to_string(),
    };
    eprint!(
        "\r{}/{} ({}%)  kept {}  ETA {}   ",
        progress.processed,
        progress.total,
        progress.percent(),
        progress.matches,
        eta
    );
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Initialize tracing on stderr, or into a log file when one is given.
///
/// Returns the appender guard that must stay alive for the run so buffered
/// log lines are flushed on exit.
fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
