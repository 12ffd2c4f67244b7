//! Output routing: immediate EPD appends plus a buffered puzzle document.
//!
//! EPD lines are flushed one by one so partial progress survives a crash or
//! cancellation. The JSON document has to be a single well-formed object, so
//! puzzles accumulate in memory and are serialized once at `finalize`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::extract::MateResult;
use crate::normalize::{annotated_solution, PuzzleLine};
use crate::reader::PositionRecord;

/// Static rating assigned to emitted puzzles; this tool does not rate.
const DEFAULT_ELO: u32 = 1200;

/// Fixed document labels.
const THEME: &str = "Mates";

/// One entry in the puzzle document.
#[derive(Debug, Clone, Serialize)]
pub struct Puzzle {
    pub fen: String,
    pub solution: Vec<String>,
    pub moves_to_mate: u32,
    pub elo: u32,
    pub solved: u32,
    pub failed: u32,
}

/// The complete puzzle document.
#[derive(Debug, Serialize)]
pub struct PuzzleDocument {
    pub theme: String,
    pub pattern: String,
    pub puzzles: Vec<Puzzle>,
}

pub struct OutputWriter {
    epd: Option<File>,
    json_path: Option<PathBuf>,
    puzzles: Vec<Puzzle>,
    add_solution: bool,
    finalized: bool,
}

impl OutputWriter {
    pub async fn create(
        epd_path: Option<&Path>,
        json_path: Option<PathBuf>,
        add_solution: bool,
    ) -> std::io::Result<Self> {
        let epd = match epd_path {
            Some(path) => {
                create_parent_dirs(path).await?;
                Some(File::create(path).await?)
            }
            None => None,
        };

        Ok(Self {
            epd,
            json_path,
            puzzles: Vec::new(),
            add_solution,
            finalized: false,
        })
    }

    /// Append one qualifying record to the EPD stream, flushing immediately.
    pub async fn write_epd(
        &mut self,
        record: &PositionRecord,
        mate: &MateResult,
    ) -> std::io::Result<()> {
        let Some(file) = self.epd.as_mut() else {
            return Ok(());
        };

        let mut line = record.fen.clone();
        if !record.opcodes.is_empty() {
            line.push(' ');
            line.push_str(&record.opcodes.join(" "));
        }
        if self.add_solution {
            let moves = annotated_solution(&mate.line).join(" ");
            line.push_str(&format!(" ; sol \"{}\";", moves));
            line.push_str(&format!(" ; theme \"mate {}\";", mate.moves_to_mate));
        }
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Queue one puzzle for the JSON document. No-op without a JSON target.
    pub fn add_puzzle(&mut self, line: PuzzleLine, mate: &MateResult) {
        if self.json_path.is_none() {
            return;
        }
        self.puzzles.push(Puzzle {
            fen: line.fen,
            solution: line.solution,
            moves_to_mate: mate.moves_to_mate,
            elo: DEFAULT_ELO,
            solved: 0,
            failed: 0,
        });
    }

    pub fn puzzle_count(&self) -> usize {
        self.puzzles.len()
    }

    /// Flush everything. Idempotent and safe to call from any terminal state.
    pub async fn finalize(&mut self) -> std::io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        if let Some(file) = self.epd.as_mut() {
            file.flush().await?;
        }

        if let Some(path) = self.json_path.take() {
            create_parent_dirs(&path).await?;
            let document = PuzzleDocument {
                theme: THEME.to_string(),
                pattern: THEME.to_string(),
                puzzles: std::mem::take(&mut self.puzzles),
            };
            let payload = serde_json::to_string_pretty(&document)?;
            tokio::fs::write(&path, payload).await?;
            tracing::info!(
                "Saved JSON output with {} entries to {}",
                document.puzzles.len(),
                path.display()
            );
        }

        Ok(())
    }
}

async fn create_parent_dirs(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
