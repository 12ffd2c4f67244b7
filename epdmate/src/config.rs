//! Runtime defaults for the epdmate CLI.
//!
//! Every value has a compile-time default and can be overridden via a
//! dedicated environment variable; explicit command-line flags win over both.

use std::path::PathBuf;

/// Default engine search depth.
const DEFAULT_DEPTH: u32 = 20;

/// Default engine thread count.
const DEFAULT_THREADS: u32 = 1;

/// Default engine binary, resolved via PATH.
const DEFAULT_ENGINE: &str = "stockfish";

/// Get the default search depth.
///
/// Priority:
/// 1. `EPDMATE_DEPTH` env variable if set (falls back to the default if the
///    value cannot be parsed as a `u32`)
/// 2. `20` as fallback
pub fn get_default_depth() -> u32 {
    if let Ok(depth) = std::env::var("EPDMATE_DEPTH") {
        return depth.parse().unwrap_or(DEFAULT_DEPTH);
    }

    DEFAULT_DEPTH
}

/// Get the default engine thread count.
///
/// Priority:
/// 1. `EPDMATE_THREADS` env variable if set
/// 2. `1` as fallback
pub fn get_default_threads() -> u32 {
    if let Ok(threads) = std::env::var("EPDMATE_THREADS") {
        return threads.parse().unwrap_or(DEFAULT_THREADS);
    }

    DEFAULT_THREADS
}

/// Get the default engine binary path.
///
/// Priority:
/// 1. `EPDMATE_ENGINE` env variable if set
/// 2. `stockfish` (PATH lookup) as fallback
pub fn get_default_engine() -> PathBuf {
    if let Ok(path) = std::env::var("EPDMATE_ENGINE") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_ENGINE)
}
