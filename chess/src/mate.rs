//! Mating-line verification.
//!
//! The engine's principal variation is never trusted blindly: it is replayed
//! move by move on the analyzed board, and a line only counts as a mate when
//! one of its plies actually produces a checkmate position.

use cozy_chess::{Board, GameStatus};

use crate::types::Color;
use crate::uci::{convert_uci_castling_to_cozy, parse_uci_move};

/// Outcome of replaying a principal variation that reaches checkmate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatingLine {
    /// 0-based index of the ply that delivers mate.
    pub mate_index: usize,
    /// Side that plays the mating move.
    pub mating_side: Color,
}

/// Play a single UCI move string on a board, returning the resulting position.
///
/// Returns `None` if the token does not parse or the move is illegal.
pub fn play_uci(board: &Board, token: &str) -> Option<Board> {
    let mv = parse_uci_move(token).ok()?;
    let mv = convert_uci_castling_to_cozy(mv, board);
    if !board.is_legal(mv) {
        return None;
    }
    let mut next = board.clone();
    next.play(mv);
    Some(next)
}

/// Replay a UCI principal variation on a board and locate the mating ply.
///
/// Stops at the first ply whose resulting position is checkmate. An illegal
/// or unparseable move, or a line that never reaches checkmate, yields `None`
/// (stale or truncated engine output).
pub fn find_mating_ply(board: &Board, pv: &[String]) -> Option<MatingLine> {
    let side_to_move = Color::from(board.side_to_move());
    let mut position = board.clone();

    for (idx, token) in pv.iter().enumerate() {
        position = play_uci(&position, token)?;
        if position.status() == GameStatus::Won {
            // Even indices are moves by the side to move at the root.
            let mating_side = if idx % 2 == 0 {
                side_to_move
            } else {
                side_to_move.opponent()
            };
            return Some(MatingLine {
                mate_index: idx,
                mating_side,
            });
        }
    }

    None
}
