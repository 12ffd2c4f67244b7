pub mod fen;
pub mod mate;
pub mod types;
pub mod uci;

pub use fen::{parse_epd_fen, FenError};
pub use mate::{find_mating_ply, MatingLine};
pub use types::Color;
pub use uci::{convert_uci_castling_to_cozy, format_uci_move, parse_uci_move, MoveError};
