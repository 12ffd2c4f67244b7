//! The mate analysis pipeline: stream EPD positions through one UCI engine
//! session, keep the forced mates within a move limit, and write the
//! survivors as filtered EPD and/or a puzzle document.

pub mod extract;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod reader;
pub mod runner;

pub use extract::{extract, MateResult};
pub use normalize::{puzzle_line, PuzzleLine};
pub use output::{OutputWriter, Puzzle, PuzzleDocument};
pub use progress::{RunEvent, RunOutcome, RunProgress, RunSummary};
pub use reader::{count_positions, EpdReader, ParseError, PositionRecord};
pub use runner::{run_with_engine, spawn_run, Canceller, RunConfig, RunError, RunHandle};
