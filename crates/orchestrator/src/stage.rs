//! Per-stage lifecycle

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// Lifecycle of one pipeline stage
///
/// Only ever moves forward: `NotStarted -> Running -> Draining -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StageState {
    NotStarted = 0,
    /// Workers are running and input is still open
    Running = 1,
    /// Input ended, workers finish what they hold
    Draining = 2,
    /// Every worker of the stage was joined
    Terminated = 3,
}

impl StageState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Shared view of a stage's state
#[derive(Debug)]
pub struct StageTracker {
    name: &'static str,
    state: AtomicU8,
}

impl StageTracker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(StageState::NotStarted as u8),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state.
    ///
    /// Returns false (and changes nothing) for backward or repeated moves.
    pub fn advance(&self, next: StageState) -> bool {
        let previous = StageState::from_u8(self.state.fetch_max(next as u8, Ordering::AcqRel));
        let moved = previous < next;
        if moved {
            debug!(stage = self.name, from = %previous, to = %next, "Stage transition");
        }
        moved
    }
}
