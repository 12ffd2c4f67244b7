use crate::uci::UciError;
use crate::{Analysis, Score};

/// Incoming message from a UCI engine.
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `bestmove (none)` (terminal position) is represented as `None`.
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    Info(Analysis),
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            let mv = match tokens.get(1) {
                Some(&"(none)") => None,
                Some(tok) if is_move_token(tok) => Some(tok.to_string()),
                _ => return Err(UciError::MalformedMessage(line.to_string())),
            };
            let ponder = if tokens.len() >= 4 && tokens[2] == "ponder" {
                Some(tokens[3].to_string())
            } else {
                None
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an "info" line from the engine
fn parse_info_line(tokens: &[&str]) -> Analysis {
    let mut info = Analysis::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "seldepth" => {
                i += 1;
                info.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                info.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                info.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "pv" => {
                // Collect move tokens until the next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if is_move_token(tokens[i]) {
                        info.pv.push(tokens[i].to_string());
                    }
                    i += 1;
                }
                continue; // Don't increment i again
            }
            "multipv" | "currmove" | "hashfull" | "tbhits" | "cpuload" => {
                // Recognized but unused; skip the value
                i += 1;
            }
            _ => {
                // Unknown keyword, skip
            }
        }
        i += 1;
    }

    info
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
    )
}

/// Syntactic check for a UCI move token (e2e4, e7e8q). Legality is checked
/// later against the actual board.
fn is_move_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() < 4 || bytes.len() > 5 {
        return false;
    }
    let square_ok = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    if !square_ok(bytes[0], bytes[1]) || !square_ok(bytes[2], bytes[3]) {
        return false;
    }
    bytes.len() == 4 || matches!(bytes[4], b'q' | b'r' | b'b' | b'n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove { mv, ponder } => {
                assert_eq!(mv.as_deref(), Some("e2e4"));
                assert_eq!(ponder.as_deref(), Some("e7e5"));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_none() {
        let msg = parse_uci_message("bestmove (none)").unwrap();
        assert!(matches!(msg, UciMessage::BestMove { mv: None, .. }));
    }

    #[test]
    fn test_parse_bestmove_garbage_is_malformed() {
        assert!(matches!(
            parse_uci_message("bestmove ??"),
            Err(UciError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_parse_info_centipawns() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert!(matches!(info.score, Some(Score::Centipawns(35))));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info_mate_score() {
        let msg =
            parse_uci_message("info depth 20 seldepth 5 score mate 2 pv d5g8 e8g8 h6f7").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert!(matches!(info.score, Some(Score::Mate(2))));
                assert_eq!(info.pv, vec!["d5g8", "e8g8", "h6f7"]);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info_negative_mate() {
        let msg = parse_uci_message("info depth 18 score mate -3 pv h4f2").unwrap();
        match msg {
            UciMessage::Info(info) => assert!(matches!(info.score, Some(Score::Mate(-3)))),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_unknown_line_is_not_fatal() {
        assert!(matches!(
            parse_uci_message("Stockfish 16 by the Stockfish developers"),
            Err(UciError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_pv_stops_at_keyword() {
        let msg = parse_uci_message("info pv e2e4 e7e5 nps 100000").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
                assert_eq!(info.nps, Some(100000));
            }
            _ => panic!("Wrong message type"),
        }
    }
}
