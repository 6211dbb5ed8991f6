//! End-to-end flow: ingest a roster export, run a project through the
//! countdown, reconcile a corrected export, and read the results back from
//! storage.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use startgrid::{
    GridError, ManualClock, MemoryBackend, PersistenceStore, ProjectStateManager, StartGrid,
    StatusKind, TimerEngine, parse_roster_html, report,
};

const T0: i64 = 1_750_000_000_000;

/// Three start rows at 10:00 / 10:10 / 10:20 plus one unscheduled entry.
const EXPORT: &str = r#"<!DOCTYPE html>
<html><head><title>Start list</title></head>
<body>
<p>Generated by the entry system.</p>
<script>
var race = {"id":"race-42","object":"race","courses":[],
"data":{"title":"Autumn Relay","start_datetime":"2026-09-12 10:00:00",
"chief_referee":"L. Holm","description":"","end_datetime":"","location":"Pine Forest",
"race_type":0,"relay_leg_count":1,"secretary":"","url":""},
"groups":[{"id":"g1","name":"M21","long_name":"Men 21","start_corridor":1,
"start_interval":600000,"count_person":3},
{"id":"g2","name":"W21","long_name":"Women 21","start_corridor":2,
"start_interval":600000,"count_person":3}],
"organizations":[],
"persons":[
{"id":"p1","bib":1,"name":"Anna","surname":"Berg","group_id":"g1","start_group":1,"start_time":36000000},
{"id":"p2","bib":2,"name":"Olle","surname":"Krav","group_id":"g2","start_group":2,"start_time":36000000},
{"id":"p3","bib":3,"name":"Mika","surname":"Aho","group_id":"g1","start_group":1,"start_time":36600000},
{"id":"p4","bib":4,"name":"Sara","surname":"Lund","group_id":"g2","start_group":2,"start_time":36600000},
{"id":"p5","bib":5,"name":"Ivan","surname":"Orlov","group_id":"g1","start_group":1,"start_time":37200000},
{"id":"p6","bib":6,"name":"Vera","surname":"Iso","group_id":"g2","start_group":2,"start_time":37200000},
{"id":"p7","bib":99,"name":"Late","surname":"Entry","group_id":"g1","start_group":1,"start_time":0}],
"results":[],"settings":{}};
</script>
</body></html>"#;

/// Same race, re-exported: bib 6 withdrew, bib 7 is new in the last row, and
/// the unscheduled bib 99 got a start time assigned.
const EXPORT_V2: &str = r#"<html><body><script>
var race = {"id":"race-42","object":"race",
"data":{"title":"Autumn Relay"},
"groups":[{"id":"g1","name":"M21","long_name":"Men 21","start_corridor":1,
"start_interval":600000,"count_person":3}],
"persons":[
{"id":"p1","bib":1,"name":"Anna","surname":"Berg","group_id":"g1","start_group":1,"start_time":36000000},
{"id":"p2","bib":2,"name":"Olle","surname":"Krav","group_id":"g1","start_group":2,"start_time":36000000},
{"id":"p3","bib":3,"name":"Mika","surname":"Aho","group_id":"g1","start_group":1,"start_time":36600000},
{"id":"p4","bib":4,"name":"Sara","surname":"Lund","group_id":"g1","start_group":2,"start_time":36600000},
{"id":"p5","bib":5,"name":"Ivan","surname":"Orlov","group_id":"g1","start_group":1,"start_time":37200000},
{"id":"p8","bib":7,"name":"Nils","surname":"Ek","group_id":"g1","start_group":1,"start_time":37200000},
{"id":"p7","bib":99,"name":"Late","surname":"Entry","group_id":"g1","start_group":1,"start_time":37200000}],
"results":[],"settings":{}};
</script></body></html>"#;

fn manager_over(backend: MemoryBackend, clock: ManualClock) -> ProjectStateManager {
    ProjectStateManager::new(PersistenceStore::new(Box::new(backend)), Arc::new(clock))
}

#[test]
fn ingested_roster_becomes_a_three_row_grid() {
    let race = parse_roster_html(EXPORT).unwrap();
    assert_eq!(race.id, "race-42");
    assert_eq!(race.persons.len(), 7);

    let clock = ManualClock::new(T0);
    let mut manager = manager_over(MemoryBackend::new(), clock);
    let project = manager.create_project(race).unwrap();

    assert_eq!(project.no_start_time_bibs, vec![99]);
    let rows = manager.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].start_time, 36_000_000);
    assert_eq!(rows[2].start_time, 37_200_000);
    // Corridor ordering within a row follows start_group.
    assert_eq!(rows[0].persons[0].bib, 1);
    assert_eq!(rows[0].persons[1].bib, 2);
}

#[tokio::test(start_paused = true)]
async fn countdown_drives_statuses_and_reset() {
    let _ = tracing_subscriber::fmt::try_init();
    let race = parse_roster_html(EXPORT).unwrap();
    let clock = ManualClock::new(T0);
    let manager = Arc::new(Mutex::new(manager_over(MemoryBackend::new(), clock.clone())));
    manager.lock().unwrap().create_project(race).unwrap();

    let mut engine = TimerEngine::new(Arc::clone(&manager));
    let snap = engine.start().unwrap();
    assert_eq!(snap.current_row, Some(0));
    assert_eq!(snap.row_count, 3);

    // A subscriber sees the live state without waiting for a tick.
    let first = engine.subscribe().next().await.unwrap();
    assert_eq!(first.current_row, Some(0));

    // Row 0 starts: two entries, both clean.
    manager.lock().unwrap().quick_enter(1).unwrap();
    manager.lock().unwrap().quick_enter(2).unwrap();

    // Ten minutes later the countdown sits on row 1.
    for _ in 0..600 {
        clock.advance(1_000);
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.snapshot().current_row, Some(1));

    // Bib 1 (row 0, start 36000000) shows up during row 1 (36600000): 10 min.
    manager.lock().unwrap().mark_late(1).unwrap();
    {
        let guard = manager.lock().unwrap();
        let record = guard.current().unwrap().statuses.record(1).unwrap().clone();
        assert_eq!(record.status, StatusKind::Late);
        assert_eq!(record.delay_minutes, Some(10));
    }
    manager.lock().unwrap().quick_enter(3).unwrap();
    manager.lock().unwrap().mark_absent(4).unwrap();

    // Operator pulls the countdown back to row 1; row 2 progress (none yet)
    // is cleared, rows 0 and 1 keep their marks.
    let snap = engine.reset_to_row(1).unwrap();
    assert_eq!(snap.current_row, Some(1));
    {
        let guard = manager.lock().unwrap();
        let project = guard.current().unwrap();
        assert_eq!(project.statuses.status(1), StatusKind::Late);
        assert_eq!(project.statuses.status(3), StatusKind::Entered);
        assert_eq!(project.statuses.status(4), StatusKind::Absent);
    }

    engine.finish().unwrap();
    let snap = engine.snapshot();
    assert!(!snap.started);

    // Statuses survive the finish.
    let guard = manager.lock().unwrap();
    assert_eq!(guard.current().unwrap().statuses.status(3), StatusKind::Entered);
}

#[test]
fn reconcile_merges_a_corrected_export_mid_race() {
    let clock = ManualClock::new(T0);
    let mut manager = manager_over(MemoryBackend::new(), clock.clone());
    manager.create_project(parse_roster_html(EXPORT).unwrap()).unwrap();

    manager.start_timer().unwrap();
    manager.quick_enter(1).unwrap(); // row 0, reached
    manager.quick_enter(5).unwrap(); // row 2, not reached
    manager.quick_enter(6).unwrap(); // row 2 and withdrawn in v2

    // Countdown reaches row 1; cutoff is row 1's start (36600000).
    clock.advance(600_000);
    manager.tick().unwrap();

    manager.reconcile(parse_roster_html(EXPORT_V2).unwrap()).unwrap();
    let project = manager.current().unwrap();

    // Carried: bib 1 (start 36000000 < cutoff). Pruned: bib 5 (row not
    // reached), bib 6 (gone from the roster).
    assert_eq!(project.statuses.status(1), StatusKind::Entered);
    assert_eq!(project.statuses.status(5), StatusKind::NotSet);
    assert!(project.race_data.person(6).is_none());
    assert!(project.race_data.person(7).is_some());

    // Bib 99 stays excluded from the grid even though v2 assigns it a time.
    assert!(project.is_unscheduled(99));
    assert_eq!(manager.rows().len(), 3);

    // Timer untouched by the merge.
    assert!(project.timer_state.is_running());
    assert_eq!(project.timer_state.start_time, Some(T0));
}

#[test]
fn failed_reconcile_leaves_stored_bytes_untouched() {
    let backend = MemoryBackend::new();
    let clock = ManualClock::new(T0);
    let mut manager = manager_over(backend.clone(), clock);
    manager.create_project(parse_roster_html(EXPORT).unwrap()).unwrap();

    let before = backend.snapshot().unwrap();

    let mut other = parse_roster_html(EXPORT).unwrap();
    other.id = "race-43".into();
    let err = manager.reconcile(other).unwrap_err();
    assert!(matches!(err, GridError::RaceMismatch { .. }));

    assert_eq!(backend.snapshot().unwrap(), before);
}

#[test]
fn projects_survive_a_restart() {
    let backend = MemoryBackend::new();
    let clock = ManualClock::new(T0);

    let project_id = {
        let mut manager = manager_over(backend.clone(), clock.clone());
        manager.create_project(parse_roster_html(EXPORT).unwrap()).unwrap();
        manager.start_timer().unwrap();
        manager.quick_enter(1).unwrap();
        manager.current().unwrap().id.clone()
    };

    // Fresh manager over the same bytes: current project, timer state and
    // statuses all come back.
    let manager = manager_over(backend, clock);
    let project = manager.current().unwrap();
    assert_eq!(project.id, project_id);
    assert!(project.timer_state.is_running());
    assert_eq!(project.statuses.status(1), StatusKind::Entered);
}

#[test]
fn exports_cover_the_whole_roster() {
    let clock = ManualClock::new(T0);
    let mut manager = manager_over(MemoryBackend::new(), clock);
    manager.create_project(parse_roster_html(EXPORT).unwrap()).unwrap();
    manager.quick_enter(1).unwrap();
    manager.mark_late(3).unwrap();
    manager.mark_absent(4).unwrap();

    let project = manager.current().unwrap();

    let csv = report::to_csv(project);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 8); // header + 7 participants
    assert_eq!(lines[0], "Bib,Name,Surname,Group,Status,DelayMinutes");
    assert!(lines[1].starts_with("1,Anna,Berg,M21,entered"));

    let json = report::to_json(project, T0).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["race"]["id"], "race-42");
    assert_eq!(value["report"]["totalParticipants"], 7);
    assert_eq!(value["report"]["entered"], 1);
    assert_eq!(value["report"]["late"][0]["bib"], 3);
    assert_eq!(value["report"]["absent"][0]["bib"], 4);
}

#[test]
fn grid_facade_wires_everything_together() {
    let grid = StartGrid::in_memory();
    let manager = grid.manager();
    manager
        .lock()
        .unwrap()
        .create_project(parse_roster_html(EXPORT).unwrap())
        .unwrap();

    let engine = grid.engine();
    assert!(!engine.snapshot().started);
    assert_eq!(engine.snapshot().row_count, 3);
}
