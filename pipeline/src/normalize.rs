//! Move-order normalization for puzzle output.
//!
//! Puzzle consumers expect the solution to start with the mating side's move.
//! When the analyzed position has the defender to move, the position is
//! advanced by exactly one ply (the PV's first move) and the solution is
//! re-sliced. EPD output is never affected; it always carries the original
//! FEN.

use chess::mate::play_uci;
use chess::Color;

use crate::extract::MateResult;
use crate::reader::PositionRecord;

/// FEN and solution for one puzzle entry. The final solution move carries a
/// `#` suffix by convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleLine {
    pub fen: String,
    pub solution: Vec<String>,
}

/// Copy a mating line, marking the mating move with `#`.
pub fn annotated_solution(line: &[String]) -> Vec<String> {
    let mut solution: Vec<String> = line.to_vec();
    if let Some(last) = solution.last_mut() {
        last.push('#');
    }
    solution
}

/// Build the puzzle-side view of a qualifying position.
///
/// With normalization disabled, or when the side to move already delivers
/// the mate, this is the original FEN with the full line.
pub fn puzzle_line(record: &PositionRecord, mate: &MateResult, fix_move_order: bool) -> PuzzleLine {
    let side_to_move = Color::from(record.board.side_to_move());

    if fix_move_order && side_to_move != mate.mating_side {
        // The verified line starts with a defender move; consume it.
        if let Some(advanced) = play_uci(&record.board, &mate.line[0]) {
            return PuzzleLine {
                fen: advanced.to_string(),
                solution: annotated_solution(&mate.line[1..]),
            };
        }
        // The line was verified during extraction, so this is unreachable in
        // practice; fall through to the unnormalized form.
        tracing::warn!(line = %record.line_number, "Could not advance position for move-order fix");
    }

    PuzzleLine {
        fen: record.fen.clone(),
        solution: annotated_solution(&mate.line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const SMOTHERED: &str = "3qr2k/3p2pp/7N/3Q2b1/8/8/5PP1/5RK1 w - - 0 1";

    fn record(fen: &str) -> PositionRecord {
        PositionRecord {
            fen: fen.to_string(),
            board: fen.parse().unwrap(),
            opcodes: vec![],
            line_number: 1,
        }
    }

    fn mate(side: Color, line: &[&str]) -> MateResult {
        MateResult {
            mating_side: side,
            moves_to_mate: (line.len() as u32).div_ceil(2),
            line: line.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_disabled_keeps_original_fen_and_line() {
        let m = mate(Color::White, &["d5g8", "e8g8", "h6f7"]);
        let puzzle = puzzle_line(&record(SMOTHERED), &m, false);
        assert_eq!(puzzle.fen, SMOTHERED);
        assert_eq!(puzzle.solution, vec!["d5g8", "e8g8", "h6f7#"]);
    }

    #[test]
    fn test_noop_when_mating_side_already_to_move() {
        let m = mate(Color::White, &["d5g8", "e8g8", "h6f7"]);
        let puzzle = puzzle_line(&record(SMOTHERED), &m, true);
        assert_eq!(puzzle.fen, SMOTHERED);
        assert_eq!(puzzle.solution, vec!["d5g8", "e8g8", "h6f7#"]);
    }

    #[test]
    fn test_flip_advances_exactly_one_ply() {
        // Defender (white) to move, black delivers the mate.
        let m = mate(Color::Black, &["e2e4", "d8h4"]);
        let puzzle = puzzle_line(&record(START_FEN), &m, true);

        // FEN context advanced by one ply: now black to move.
        let advanced: cozy_chess::Board = puzzle.fen.parse().unwrap();
        assert_eq!(advanced.side_to_move(), cozy_chess::Color::Black);

        // Solution re-sliced so the first move belongs to the mating side.
        assert_eq!(puzzle.solution, vec!["d8h4#"]);
    }

    #[test]
    fn test_solution_final_move_is_marked() {
        let m = mate(Color::White, &["a1a8"]);
        let puzzle = puzzle_line(&record("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1"), &m, false);
        assert_eq!(puzzle.solution, vec!["a1a8#"]);
    }
}
