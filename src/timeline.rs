//! Timeline derivation: start rows, interval table, current-row mapping.
//!
//! Everything here is a pure function of the roster. Rows are never persisted;
//! they are recomputed from `Project.race_data` and `no_start_time_bibs` on
//! every read so a mid-race roster reconciliation changes row boundaries
//! without any cache invalidation. The timer engine relies on that: each tick
//! re-derives the interval table instead of trusting a captured snapshot.

use std::collections::{BTreeMap, HashSet};

use crate::types::Person;

/// One row of the start grid: every participant sharing a start time,
/// ordered by corridor (`start_group`).
#[derive(Debug, Clone, PartialEq)]
pub struct StartRow {
    /// Start time in schedule milliseconds.
    pub start_time: i64,
    pub persons: Vec<Person>,
}

/// Group `persons` into rows by start time, excluding the given bibs.
///
/// Exclusion is by membership only: a participant flagged as originally
/// unscheduled stays off the grid even after a start time is assigned.
/// Rows come back sorted ascending by start time; within a row, participants
/// sort ascending by `start_group` (stable, so roster order breaks ties).
pub fn build_rows(persons: &[Person], excluded_bibs: &HashSet<u32>) -> Vec<StartRow> {
    let mut by_time: BTreeMap<i64, Vec<Person>> = BTreeMap::new();
    for person in persons {
        if excluded_bibs.contains(&person.bib) {
            continue;
        }
        by_time.entry(person.start_time).or_default().push(person.clone());
    }

    by_time
        .into_iter()
        .map(|(start_time, mut persons)| {
            persons.sort_by_key(|p| p.start_group);
            StartRow { start_time, persons }
        })
        .collect()
}

/// Width of the widest row, minimum 1.
pub fn max_corridors(rows: &[StartRow]) -> usize {
    rows.iter().map(|r| r.persons.len()).max().unwrap_or(0).max(1)
}

/// Interval table between consecutive rows.
///
/// `intervals[i]` is the gap from row `i` to row `i + 1`; the final entry
/// repeats the last gap so the last row has a defined dwell duration and
/// `intervals.len() == rows.len()`. Zero or one rows need no intervals and
/// yield an empty table.
pub fn calculate_intervals(rows: &[StartRow]) -> Vec<i64> {
    let mut intervals: Vec<i64> = Vec::with_capacity(rows.len());

    for pair in rows.windows(2) {
        intervals.push(pair[1].start_time - pair[0].start_time);
    }

    if let Some(&last) = intervals.last() {
        intervals.push(last);
    }

    intervals
}

/// Map elapsed time to a row index: the count of fully-elapsed intervals.
///
/// A deterministic step function, non-decreasing in `elapsed_ms`; the boundary
/// instant belongs to the later row. Returns 0 for any elapsed time short of
/// the first interval (or an empty table). Once the whole schedule has
/// elapsed this returns `intervals.len()`, one past the last row index;
/// callers indexing rows guard with `rows.get(..)`.
pub fn current_row_for(elapsed_ms: i64, intervals: &[i64]) -> usize {
    let mut sum = 0i64;
    let mut row = 0usize;

    for (i, &interval) in intervals.iter().enumerate() {
        if elapsed_ms >= sum + interval {
            sum += interval;
            row = i + 1;
        } else {
            break;
        }
    }

    row
}

/// Elapsed time needed for the countdown to reach the start of row `row`:
/// the sum of the first `row` intervals.
pub fn elapsed_to_row(row: usize, intervals: &[i64]) -> i64 {
    intervals.iter().take(row).sum()
}

/// Render schedule milliseconds as `HH:MM:SS`.
pub fn format_hhmmss(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1_000;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
