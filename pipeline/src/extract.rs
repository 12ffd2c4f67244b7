//! Mate extraction: turn a raw engine result into a verified mate, or reject.

use cozy_chess::Board;

use chess::{find_mating_ply, Color};
use engine::{Analysis, Score};

/// A verified forced mate for one analyzed position.
#[derive(Debug, Clone)]
pub struct MateResult {
    /// Side that delivers the mate.
    pub mating_side: Color,
    /// Full-move count to mate, derived from the verified line.
    pub moves_to_mate: u32,
    /// Principal variation truncated at the mating move, as UCI strings.
    pub line: Vec<String>,
}

/// Interpret an analysis result. Returns `None` for anything that is not a
/// qualifying mate: centipawn scores however large, mates for the side being
/// mated, distances beyond `mate_limit`, and lines whose replay does not end
/// in checkmate.
pub fn extract(board: &Board, analysis: &Analysis, mate_limit: u32) -> Option<MateResult> {
    let reported = match analysis.score {
        Some(Score::Mate(m)) if m >= 1 => m as u32,
        _ => return None,
    };
    if reported > mate_limit || analysis.pv.is_empty() {
        return None;
    }

    let mating = find_mating_ply(board, &analysis.pv)?;

    // Full moves made by the mating side up to and including the mating ply.
    let derived = (mating.mate_index / 2 + 1) as u32;
    if derived != reported {
        // Stale or truncated PV relative to the reported distance.
        tracing::debug!(
            reported,
            derived,
            "Mate distance disagrees with its own PV, rejecting"
        );
        return None;
    }

    Some(MateResult {
        mating_side: mating.mating_side,
        moves_to_mate: derived,
        line: analysis.pv[..=mating.mate_index].to_vec(),
    })
}
