//! Timer state machine data

use serde::{Deserialize, Serialize};

/// Persisted countdown state of a project.
///
/// Two states: Idle (`started == false`) and Running (`started == true` with
/// `start_time` set). The canonical idle form clears all fields, but
/// `current_row` is tolerated while idle during reset flows. While running
/// against an unchanged `start_time`, `current_row` only moves forward.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub started: bool,
    /// Wall-clock milliseconds the countdown is anchored to.
    pub start_time: Option<i64>,
    /// 0-based index of the row the countdown has reached.
    pub current_row: Option<usize>,
}

impl TimerState {
    /// Canonical idle state.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Running state anchored at `start_time`.
    pub fn running(start_time: i64, current_row: usize) -> Self {
        Self { started: true, start_time: Some(start_time), current_row: Some(current_row) }
    }

    pub fn is_running(&self) -> bool {
        self.started && self.start_time.is_some()
    }
}

/// Point-in-time view of the countdown, republished on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub started: bool,
    /// Milliseconds elapsed since the countdown anchor; 0 while idle.
    pub elapsed_ms: i64,
    pub current_row: Option<usize>,
    /// Number of rows in the current timeline.
    pub row_count: usize,
}

impl TimerSnapshot {
    /// Snapshot of an idle timer over a timeline of `row_count` rows.
    pub fn idle(row_count: usize) -> Self {
        Self { started: false, elapsed_ms: 0, current_row: None, row_count }
    }
}
