pub mod session;
pub mod uci;

pub use session::{EngineConfig, UciEngine};
pub use uci::{parse_uci_message, UciError, UciMessage};

/// A completed search result for one position.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub score: Option<Score>,
    /// Principal variation as UCI move strings.
    pub pv: Vec<String>,
}

impl Analysis {
    /// Fold a later `info` line into this result. The engine repeats score
    /// and PV as the search deepens; the last report wins, but an info line
    /// without a PV must not wipe out an earlier one.
    pub fn merge(&mut self, info: Analysis) {
        if info.depth.is_some() {
            self.depth = info.depth;
        }
        if info.seldepth.is_some() {
            self.seldepth = info.seldepth;
        }
        if info.time_ms.is_some() {
            self.time_ms = info.time_ms;
        }
        if info.nodes.is_some() {
            self.nodes = info.nodes;
        }
        if info.nps.is_some() {
            self.nps = info.nps;
        }
        if info.score.is_some() {
            self.score = info.score;
        }
        if !info.pv.is_empty() {
            self.pv = info.pv;
        }
    }
}

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

/// Failure to bring up an engine process.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to spawn engine process {path}: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },
    #[error("engine has no stdin")]
    NoStdin,
    #[error("engine has no stdout")]
    NoStdout,
    #[error("engine did not complete the UCI handshake in time")]
    HandshakeTimeout,
    #[error("engine exited during the UCI handshake")]
    HandshakeEof,
    #[error("IO error during handshake: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single analysis request, or of the session as a whole.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// One request exceeded its time bound. The session may still be usable;
    /// check `is_alive` after the session has tried to resynchronize.
    #[error("engine did not answer within {0:?}")]
    Timeout(std::time::Duration),
    /// The process died or its pipes closed. The session is unusable.
    #[error("engine process crashed or closed its pipes")]
    Crashed,
    /// The engine answered with a message we recognize but cannot interpret.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),
}

/// One engine analysis session.
///
/// Requests are strictly serialized: `analyze` takes `&mut self`, so at most
/// one search can be outstanding per session. The trait exists so the run
/// controller can be driven by a scripted double in tests without spawning a
/// real process.
pub trait EngineSession {
    /// Search one position to the given depth and return the final result.
    fn analyze(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl std::future::Future<Output = Result<Analysis, EngineError>> + Send;

    /// False once the underlying process has exited or been given up on.
    fn is_alive(&self) -> bool;

    /// Release the session. Safe to call from any state; idempotent.
    fn stop(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
