//! Sequencer state and per-tick outcome.

use peel_traits::Direction;

/// Overall sequencer state. Exactly one active at a time; created Idle at
/// boot and never destroyed. Jogging is Idle plus an in-flight move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Idle,
    Testing {
        direction: Direction,
        started_ms: u64,
    },
    Resetting {
        reached_bottom: bool,
    },
}

/// What a single tick did. A pulse due inside the guard window preempts all
/// other servicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickActivity {
    /// Motion pulse pending within the guard threshold; nothing else ran.
    MotionBusy,
    /// Slack tick: host, switches and (while Testing) force were serviced.
    Serviced,
}
