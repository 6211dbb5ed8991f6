//! Project state management and the roster-reconciliation protocol.
//!
//! [`ProjectStateManager`] owns the in-memory mirror of the current
//! [`Project`] and is its sole mutator: every state transition is an explicit
//! command method that reads the owned value, builds the updated project,
//! persists it, and only then replaces the mirror. A failed persistence leaves
//! both the store and the mirror untouched, so no partial state is ever
//! observable.
//!
//! Timeline data (rows, intervals) is re-derived from the live roster inside
//! every command, never cached across mutations, so a reconciliation that
//! shifts row boundaries mid-race is picked up by the very next tick.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{GridError, Result};
use crate::status::delay_minutes;
use crate::store::PersistenceStore;
use crate::timeline::{StartRow, build_rows, calculate_intervals, current_row_for, elapsed_to_row};
use crate::types::{
    Language, NO_START_TIME, Person, Project, Race, TimerSnapshot, TimerState,
};

/// Owner and sole mutator of the current project.
pub struct ProjectStateManager {
    store: PersistenceStore,
    clock: Arc<dyn Clock>,
    current: Option<Project>,
    project_seq: u64,
}

impl ProjectStateManager {
    /// Create a manager over the given store, restoring the stored
    /// current-project pointer if it resolves.
    pub fn new(store: PersistenceStore, clock: Arc<dyn Clock>) -> Self {
        let current = store.current_project();
        if let Some(project) = &current {
            info!(project_id = %project.id, "restored current project");
        }
        Self { store, clock, current, project_seq: 0 }
    }

    /// The current project, if one is open.
    pub fn current(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    /// All stored projects.
    pub fn projects(&self) -> Vec<Project> {
        self.store.projects()
    }

    /// Stored UI language.
    pub fn language(&self) -> Language {
        self.store.language()
    }

    /// Update the stored UI language.
    pub fn set_language(&self, language: Language) -> Result<()> {
        self.store.save_language(language)
    }

    // ---- project lifecycle -------------------------------------------------

    /// Create a project from an ingested roster and make it current.
    ///
    /// Captures `no_start_time_bibs` from the roster's unscheduled
    /// participants; the list is durable from this point on.
    pub fn create_project(&mut self, race: Race) -> Result<Project> {
        let now = self.clock.now_ms();
        self.project_seq += 1;

        let project = Project {
            id: format!("project_{}_{:04}", now, self.project_seq),
            name: format!("{} - {}", race.data.title, format_project_date(now)),
            created_at: now,
            updated_at: now,
            no_start_time_bibs: race.unscheduled_bibs(),
            race_data: race,
            statuses: Default::default(),
            timer_state: TimerState::idle(),
            settings: Default::default(),
        };

        let stored = self.store.save_project(project, now)?;
        self.store.set_current_project(Some(&stored.id))?;
        info!(project_id = %stored.id, name = %stored.name, "created project");
        self.current = Some(stored.clone());
        Ok(stored)
    }

    /// Make a stored project current.
    pub fn select_project(&mut self, id: &str) -> Result<()> {
        let project = self
            .store
            .project(id)
            .ok_or_else(|| GridError::ProjectNotFound { id: id.to_string() })?;
        self.store.set_current_project(Some(id))?;
        self.current = Some(project);
        Ok(())
    }

    /// Close the current project without deleting it. The caller is
    /// responsible for stopping any tick task bound to it.
    pub fn close_project(&mut self) -> Result<()> {
        self.store.set_current_project(None)?;
        self.current = None;
        Ok(())
    }

    /// Delete a stored project; closes it first if it is current.
    pub fn delete_project(&mut self, id: &str) -> Result<()> {
        self.store.delete_project(id)?;
        if self.current.as_ref().is_some_and(|p| p.id == id) {
            self.current = None;
        }
        Ok(())
    }

    /// Toggle the persisted auto-scroll preference.
    pub fn set_auto_scroll(&mut self, enabled: bool) -> Result<()> {
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;
        let mut updated = project.clone();
        updated.settings.auto_scroll_enabled = enabled;
        self.commit(updated)
    }

    // ---- timeline reads ----------------------------------------------------

    /// Rows of the current project's start grid, re-derived from the live
    /// roster (participants tracked as unscheduled are excluded).
    pub fn rows(&self) -> Vec<StartRow> {
        self.current.as_ref().map(rows_of).unwrap_or_default()
    }

    /// Participants tracked as originally unscheduled, whether or not a start
    /// time has since been assigned.
    pub fn unscheduled_persons(&self) -> Vec<Person> {
        let Some(project) = &self.current else { return Vec::new() };
        project
            .race_data
            .persons
            .iter()
            .filter(|p| project.is_unscheduled(p.bib))
            .cloned()
            .collect()
    }

    /// Point-in-time view of the countdown.
    pub fn snapshot(&self) -> TimerSnapshot {
        let Some(project) = &self.current else { return TimerSnapshot::idle(0) };
        let row_count = rows_of(project).len();

        match (project.timer_state.started, project.timer_state.start_time) {
            (true, Some(start)) => TimerSnapshot {
                started: true,
                elapsed_ms: (self.clock.now_ms() - start).max(0),
                current_row: project.timer_state.current_row,
                row_count,
            },
            _ => TimerSnapshot {
                current_row: project.timer_state.current_row,
                ..TimerSnapshot::idle(row_count)
            },
        }
    }

    // ---- timer commands ----------------------------------------------------

    /// Idle -> Running. Anchors the countdown at the current instant with the
    /// first row live.
    pub fn start_timer(&mut self) -> Result<TimerSnapshot> {
        let now = self.clock.now_ms();
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;
        if project.timer_state.is_running() {
            return Err(GridError::timer("timer is already running"));
        }

        let mut updated = project.clone();
        updated.timer_state = TimerState::running(now, 0);
        self.commit(updated)?;
        info!("timer started");
        Ok(self.snapshot())
    }

    /// One countdown step: re-derive intervals from the live roster, map
    /// elapsed time to a row, persist only when the row actually changed.
    ///
    /// Returns `Ok(None)` when there is nothing to drive (no project, or the
    /// timer is idle), letting the tick task wind itself down.
    pub fn tick(&mut self) -> Result<Option<TimerSnapshot>> {
        let now = self.clock.now_ms();
        let Some(project) = self.current.as_ref() else { return Ok(None) };
        let (true, Some(start_time)) = (project.timer_state.started, project.timer_state.start_time)
        else {
            return Ok(None);
        };

        let rows = rows_of(project);
        let intervals = calculate_intervals(&rows);
        let elapsed = now - start_time;
        let new_row = current_row_for(elapsed, &intervals);

        if project.timer_state.current_row != Some(new_row) {
            let mut updated = project.clone();
            updated.timer_state.current_row = Some(new_row);
            self.commit(updated)?;
            debug!(row = new_row, elapsed_ms = elapsed, "advanced to row");
        }

        Ok(Some(TimerSnapshot {
            started: true,
            elapsed_ms: elapsed,
            current_row: Some(new_row),
            row_count: rows.len(),
        }))
    }

    /// Rewind (or fast-forward) the countdown so that row `row` is current.
    /// `row` must index an existing row of the live timeline.
    ///
    /// Re-anchors `start_time` as if the countdown had run exactly up to the
    /// start of the target row, and clears the statuses of every participant
    /// in rows strictly after it; progress for rows already passed is kept.
    pub fn reset_to_row(&mut self, row: usize) -> Result<TimerSnapshot> {
        let now = self.clock.now_ms();
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;

        let rows = rows_of(project);
        if row >= rows.len() {
            return Err(GridError::timer(format!(
                "row {row} is out of range, the timeline has {} rows",
                rows.len()
            )));
        }
        let intervals = calculate_intervals(&rows);
        let elapsed = elapsed_to_row(row, &intervals);

        let mut updated = project.clone();
        updated.timer_state = TimerState::running(now - elapsed, row);
        for later_row in rows.iter().skip(row + 1) {
            for person in &later_row.persons {
                updated.statuses.clear(person.bib);
            }
        }
        self.commit(updated)?;
        info!(row, "timer reset to row");
        Ok(self.snapshot())
    }

    /// Running -> Idle. Statuses are kept.
    pub fn finish_timer(&mut self) -> Result<()> {
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;
        if !project.timer_state.is_running() {
            return Ok(());
        }

        let mut updated = project.clone();
        updated.timer_state = TimerState::idle();
        self.commit(updated)?;
        info!("timer finished");
        Ok(())
    }

    // ---- status commands ---------------------------------------------------

    /// Parse operator bib input; rejects non-numeric and non-positive values.
    pub fn parse_bib(input: &str) -> Result<u32> {
        let trimmed = input.trim();
        match trimmed.parse::<u32>() {
            Ok(bib) if bib > 0 => Ok(bib),
            _ => Err(GridError::InvalidBib { input: trimmed.to_string() }),
        }
    }

    /// Mark a participant as entered. The "timer is running" precondition is
    /// the caller's responsibility.
    pub fn quick_enter(&mut self, bib: u32) -> Result<()> {
        let now = self.clock.now_ms();
        let project = self.require_person(bib)?;
        let mut updated = project.clone();
        updated.statuses.set_entered(bib, now);
        self.commit(updated)
    }

    /// Mark a participant as late, computing the delay against the start time
    /// of the row the countdown currently sits on. With an idle timer (or a
    /// countdown past the last row) no delay is recorded.
    pub fn mark_late(&mut self, bib: u32) -> Result<()> {
        let now = self.clock.now_ms();
        let project = self.require_person(bib)?;

        let delay = match (project.timer_state.is_running(), project.timer_state.current_row) {
            (true, Some(current_row)) => {
                let rows = rows_of(project);
                let person_start = project
                    .race_data
                    .person(bib)
                    .map(|p| p.start_time)
                    .unwrap_or(NO_START_TIME);
                rows.get(current_row).map(|row| delay_minutes(row.start_time, person_start))
            }
            _ => None,
        };

        let mut updated = project.clone();
        updated.statuses.set_late(bib, now, delay);
        self.commit(updated)
    }

    /// Mark a participant as absent.
    ///
    /// Unified rule: for participants tracked as originally unscheduled, an
    /// absent mark also clears any start time assigned in the meantime, so
    /// they drop back out of the "assigned" pool. Scheduled-grid participants
    /// keep their start time.
    pub fn mark_absent(&mut self, bib: u32) -> Result<()> {
        let now = self.clock.now_ms();
        let project = self.require_person(bib)?;

        let mut updated = project.clone();
        updated.statuses.set_absent(bib, now);
        if updated.is_unscheduled(bib) {
            if let Some(person) = updated.race_data.person_mut(bib) {
                if person.has_assigned_start() {
                    person.start_time = NO_START_TIME;
                }
            }
        }
        self.commit(updated)
    }

    /// Revert a participant to not-set, clearing any recorded delay.
    pub fn reset_status(&mut self, bib: u32) -> Result<()> {
        let now = self.clock.now_ms();
        let project = self.require_person(bib)?;
        let mut updated = project.clone();
        updated.statuses.reset(bib, now);
        self.commit(updated)
    }

    /// Assign a start time directly. Used to slot an originally-unscheduled
    /// participant into an existing row; their tracking as unscheduled is
    /// unaffected.
    pub fn set_person_start_time(&mut self, bib: u32, start_time_ms: i64) -> Result<()> {
        let project = self.require_person(bib)?;
        let mut updated = project.clone();
        if let Some(person) = updated.race_data.person_mut(bib) {
            person.start_time = start_time_ms;
        }
        self.commit(updated)
    }

    /// Manually add a participant without a start time.
    pub fn add_unscheduled_participant(&mut self, bib: u32) -> Result<()> {
        if bib == 0 {
            return Err(GridError::InvalidBib { input: bib.to_string() });
        }
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;
        if project.race_data.person(bib).is_some() {
            return Err(GridError::DuplicateBib { bib });
        }

        let mut updated = project.clone();
        updated.race_data.persons.push(Person {
            id: format!("manual_{bib}"),
            bib,
            start_time: NO_START_TIME,
            ..Person::default()
        });
        if !updated.no_start_time_bibs.contains(&bib) {
            updated.no_start_time_bibs.push(bib);
        }
        self.commit(updated)?;
        info!(bib, "added unscheduled participant");
        Ok(())
    }

    // ---- reconciliation ----------------------------------------------------

    /// Merge a freshly re-imported roster into the running project.
    ///
    /// The protocol, in order:
    ///
    /// 1. The new file must describe the same race (`id` match), otherwise
    ///    nothing changes.
    /// 2. With a running timer, the start time of the row the countdown has
    ///    reached (under the **old** roster) becomes the cutoff; a countdown
    ///    already past the last row means every start has been reached and no
    ///    cutoff applies.
    /// 3. Statuses are carried only for bibs still present in the new roster
    ///    whose old start time lies strictly before the cutoff; with an idle
    ///    timer every surviving bib keeps its status. This asymmetry is
    ///    deliberate: the cutoff prunes stale marks for rows the countdown
    ///    has not reached, so a corrected schedule cannot resurrect "entered"
    ///    marks for people who have not started yet.
    /// 4. `no_start_time_bibs` grows by the new roster's unscheduled bibs and
    ///    never shrinks.
    /// 5. The timer state is untouched; the next tick re-derives intervals
    ///    from the merged roster.
    ///
    /// The merge is atomic: either the fully merged project is committed or
    /// the stored project stays byte-for-byte as it was.
    pub fn reconcile(&mut self, new_race: Race) -> Result<()> {
        let now = self.clock.now_ms();
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;

        if new_race.id != project.race_data.id {
            return Err(GridError::RaceMismatch {
                expected: project.race_data.id.clone(),
                found: new_race.id,
            });
        }

        let cutoff = match (project.timer_state.started, project.timer_state.start_time) {
            (true, Some(start_time)) => {
                let rows = rows_of(project);
                let intervals = calculate_intervals(&rows);
                let row = current_row_for(now - start_time, &intervals);
                Some(rows.get(row).map(|r| r.start_time).unwrap_or(i64::MAX))
            }
            _ => None,
        };

        let mut merged = project.clone();
        merged.statuses.retain_bibs(|bib| {
            if new_race.person(bib).is_none() {
                return false;
            }
            match cutoff {
                Some(cutoff) => project
                    .race_data
                    .person(bib)
                    .is_some_and(|old| old.start_time < cutoff),
                None => true,
            }
        });
        for bib in new_race.unscheduled_bibs() {
            if !merged.no_start_time_bibs.contains(&bib) {
                merged.no_start_time_bibs.push(bib);
            }
        }
        let carried = merged.statuses.len();
        merged.race_data = new_race;

        self.commit(merged)?;
        info!(cutoff = ?cutoff, carried_statuses = carried, "roster reconciled");
        Ok(())
    }

    // ---- internals ----------------------------------------------------------

    /// Current project with `bib` present in its roster.
    fn require_person(&self, bib: u32) -> Result<&Project> {
        let project = self.current.as_ref().ok_or(GridError::NoProject)?;
        project.race_data.person(bib).ok_or(GridError::UnknownBib { bib })?;
        Ok(project)
    }

    /// Persist `project` and replace the in-memory mirror only on success.
    fn commit(&mut self, project: Project) -> Result<()> {
        let now = self.clock.now_ms();
        let stored = self.store.save_project(project, now)?;
        self.current = Some(stored);
        Ok(())
    }
}

/// The one row derivation everything uses: the project roster minus the bibs
/// tracked as originally unscheduled.
fn rows_of(project: &Project) -> Vec<StartRow> {
    let excluded: HashSet<u32> = project.no_start_time_bibs.iter().copied().collect();
    build_rows(&project.race_data.persons, &excluded)
}

/// dd.mm.yyyy stamp (UTC) used in generated project names.
fn format_project_date(now_ms: i64) -> String {
    let datetime = time::OffsetDateTime::from_unix_timestamp(now_ms / 1_000)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    format!("{:02}.{:02}.{}", datetime.day(), datetime.month() as u8, datetime.year())
}
