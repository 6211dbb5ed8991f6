//! Per-participant status records.
//!
//! [`StatusBoard`] wraps the persisted status map. Keys are `"bib_<bib>"`;
//! a missing key is equivalent to [`StatusKind::NotSet`]. The board holds
//! exactly one status per bib and knows nothing about the timer: the
//! "quick enter only while running" precondition is enforced by the command
//! layer, and every change is persisted by [`ProjectStateManager`].
//!
//! [`ProjectStateManager`]: crate::manager::ProjectStateManager

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantStatus, StatusKind};

/// Whole minutes of delay for a late start, clamped at zero.
///
/// Defined as `floor((current_row_start - person_start) / 60000)` evaluated at
/// the moment the late status is applied.
pub fn delay_minutes(current_row_start: i64, person_start: i64) -> u32 {
    ((current_row_start - person_start).max(0) / 60_000) as u32
}

/// Status records keyed by bib.
///
/// Serializes transparently as the underlying map, preserving the persisted
/// `"bib_<n>"` key layout. A `BTreeMap` keeps serialization deterministic.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusBoard {
    records: BTreeMap<String, ParticipantStatus>,
}

impl StatusBoard {
    /// Storage key for a bib.
    pub fn key(bib: u32) -> String {
        format!("bib_{bib}")
    }

    /// Full record for a bib, if one was ever set.
    pub fn record(&self, bib: u32) -> Option<&ParticipantStatus> {
        self.records.get(&Self::key(bib))
    }

    /// Effective status for a bib; a missing record reads as `NotSet`.
    pub fn status(&self, bib: u32) -> StatusKind {
        self.record(bib).map(|r| r.status).unwrap_or_default()
    }

    /// Mark a participant as entered.
    pub fn set_entered(&mut self, bib: u32, now_ms: i64) {
        self.records.insert(Self::key(bib), ParticipantStatus::new(StatusKind::Entered, now_ms));
    }

    /// Mark a participant as late, optionally carrying the computed delay.
    pub fn set_late(&mut self, bib: u32, now_ms: i64, delay: Option<u32>) {
        let mut record = ParticipantStatus::new(StatusKind::Late, now_ms);
        record.delay_minutes = delay;
        self.records.insert(Self::key(bib), record);
    }

    /// Mark a participant as absent.
    pub fn set_absent(&mut self, bib: u32, now_ms: i64) {
        self.records.insert(Self::key(bib), ParticipantStatus::new(StatusKind::Absent, now_ms));
    }

    /// Revert a participant to `NotSet`, clearing any delay.
    pub fn reset(&mut self, bib: u32, now_ms: i64) {
        self.records.insert(Self::key(bib), ParticipantStatus::new(StatusKind::NotSet, now_ms));
    }

    /// Drop the record for a bib entirely (reads as `NotSet` afterwards).
    pub fn clear(&mut self, bib: u32) {
        self.records.remove(&Self::key(bib));
    }

    /// Keep only records whose bib satisfies the predicate.
    pub fn retain_bibs(&mut self, mut keep: impl FnMut(u32) -> bool) {
        self.records.retain(|key, _| {
            key.strip_prefix("bib_")
                .and_then(|n| n.parse::<u32>().ok())
                .is_some_and(&mut keep)
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate `(bib, record)` pairs for bibs with a stored record.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ParticipantStatus)> {
        self.records.iter().filter_map(|(key, record)| {
            key.strip_prefix("bib_").and_then(|n| n.parse::<u32>().ok()).map(|bib| (bib, record))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_reads_as_not_set() {
        let board = StatusBoard::default();
        assert_eq!(board.status(42), StatusKind::NotSet);
        assert!(board.record(42).is_none());
    }

    #[test]
    fn one_status_per_bib() {
        let mut board = StatusBoard::default();
        board.set_entered(7, 1_000);
        board.set_absent(7, 2_000);

        assert_eq!(board.len(), 1);
        assert_eq!(board.status(7), StatusKind::Absent);
        assert_eq!(board.record(7).unwrap().timestamp, 2_000);
    }

    #[test]
    fn late_delay_clamps_at_zero() {
        // Scenario B: 50s late rounds down to 0 minutes.
        assert_eq!(delay_minutes(650_000, 600_000), 0);
        // Scenario C: 100s late is 1 whole minute.
        assert_eq!(delay_minutes(700_000, 600_000), 1);
        // Starting early never yields a negative delay.
        assert_eq!(delay_minutes(600_000, 900_000), 0);
    }

    #[test]
    fn reset_is_idempotent_modulo_timestamp() {
        let mut board = StatusBoard::default();
        board.set_late(5, 1_000, Some(2));

        board.reset(5, 2_000);
        let once = board.record(5).unwrap().clone();
        board.reset(5, 3_000);
        let twice = board.record(5).unwrap().clone();

        assert_eq!(once.status, twice.status);
        assert_eq!(once.delay_minutes, None);
        assert_eq!(twice.delay_minutes, None);
    }

    #[test]
    fn retain_bibs_drops_everything_else() {
        let mut board = StatusBoard::default();
        board.set_entered(1, 10);
        board.set_entered(2, 10);
        board.set_late(3, 10, Some(1));

        board.retain_bibs(|bib| bib < 3);

        assert_eq!(board.len(), 2);
        assert_eq!(board.status(3), StatusKind::NotSet);
        assert_eq!(board.status(1), StatusKind::Entered);
    }

    #[test]
    fn serializes_as_a_transparent_map() {
        let mut board = StatusBoard::default();
        board.set_entered(101, 5_000);

        let json = serde_json::to_string(&board).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains(r#""bib_101""#));

        let back: StatusBoard = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }
}
