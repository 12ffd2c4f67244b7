//! Progress snapshots delivered to the presentation layer.
//!
//! The worker is the only writer; everything it publishes is an immutable
//! value sent over a channel, so no shared mutable state crosses contexts.

use std::time::Duration;

/// Immutable snapshot of one in-flight run, emitted once per position.
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub processed: u64,
    /// Best-effort precount; 0 when unknown.
    pub total: u64,
    pub matches: u64,
    pub elapsed: Duration,
    /// Undefined until the first position completes, and whenever the total
    /// is unknown.
    pub eta: Option<Duration>,
}

impl RunProgress {
    pub fn compute(processed: u64, total: u64, matches: u64, elapsed: Duration) -> Self {
        // No denominator, no estimate: an unknown total must not render as
        // an ETA of zero.
        let eta = if processed == 0 || total == 0 {
            None
        } else {
            let remaining = total.saturating_sub(processed);
            Some(elapsed.mul_f64(remaining as f64 / processed as f64))
        };
        Self {
            processed,
            total,
            matches,
            elapsed,
            eta,
        }
    }

    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            (self.processed * 100 / self.total).min(100) as u32
        }
    }
}

/// Final accounting for a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub processed: u64,
    pub total: u64,
    pub matches: u64,
    pub elapsed: Duration,
}

/// How a run ended, short of a fatal error. Both carry whatever was
/// processed; partial results are valid and retained.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    Cancelled(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Completed(summary) | Self::Cancelled(summary) => summary,
        }
    }
}

/// Messages delivered asynchronously to the presentation layer.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress(RunProgress),
    Log(String),
}
