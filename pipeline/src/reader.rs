//! Streaming EPD input.
//!
//! One parsed record per call; the file is never held in memory. A separate
//! chunked byte pass estimates the total for progress reporting.

use std::path::Path;

use cozy_chess::Board;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};

use chess::FenError;

/// One EPD input line: a validated FEN plus its trailing opcodes.
#[derive(Debug, Clone)]
pub struct PositionRecord {
    /// The six FEN fields, joined verbatim.
    pub fen: String,
    /// Board parsed from `fen`.
    pub board: Board,
    /// Raw opcode tokens after the FEN, passed through unparsed.
    pub opcodes: Vec<String>,
    /// 1-based input line number, for error reporting.
    pub line_number: u64,
}

/// One malformed input line. Logged and skipped, never fatal.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct ParseError {
    pub line: u64,
    #[source]
    pub source: FenError,
}

pub struct EpdReader {
    lines: Lines<BufReader<File>>,
    line_number: u64,
}

impl EpdReader {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// Next position record, or `None` at end of stream.
    ///
    /// Blank lines and `#` comment lines are skipped silently; a line whose
    /// FEN fails structural validation is returned as a [`ParseError`] so the
    /// caller can log it and continue.
    pub async fn next(&mut self) -> std::io::Result<Option<Result<PositionRecord, ParseError>>> {
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let record = match chess::parse_epd_fen(&fields) {
                Ok(board) => PositionRecord {
                    fen: fields[..6].join(" "),
                    board,
                    opcodes: fields[6..].iter().map(|s| s.to_string()).collect(),
                    line_number: self.line_number,
                },
                Err(source) => {
                    return Ok(Some(Err(ParseError {
                        line: self.line_number,
                        source,
                    })))
                }
            };

            return Ok(Some(Ok(record)));
        }
    }
}

/// Best-effort count of input lines, for the progress denominator only.
///
/// Reads the file in chunks and counts newlines; blank and comment lines are
/// included, so the result can overestimate. Callers must treat a failure
/// here as "unknown total", never as a fatal error.
pub async fn count_positions(path: &Path) -> std::io::Result<u64> {
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut count = 0u64;
    let mut last_byte = b'\n';

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        count += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last_byte = buf[n - 1];
    }

    // A final line without a trailing newline still counts.
    if last_byte != b'\n' {
        count += 1;
    }

    Ok(count)
}
