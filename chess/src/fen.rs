use cozy_chess::Board;

/// Validate the FEN portion of an EPD line and parse it into a board.
///
/// The first six whitespace-separated fields of an EPD line form the FEN.
/// Lines with fewer fields are structurally invalid and rejected; a line that
/// has six fields but does not describe a legal board is rejected too.
pub fn parse_epd_fen(fields: &[&str]) -> Result<Board, FenError> {
    if fields.len() < 6 {
        return Err(FenError::MissingFields(fields.len()));
    }

    let fen = fields[..6].join(" ");
    fen.parse().map_err(|_| FenError::InvalidBoard(fen))
}

/// Format a board as a FEN string.
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("expected 6 FEN fields, found {0}")]
    MissingFields(usize),
    #[error("not a valid board position: {0}")]
    InvalidBoard(String),
}
