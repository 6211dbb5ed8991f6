//! Start-line control library for orienteering events.
//!
//! StartGrid turns a roster export into a live start grid: participants are
//! grouped into start rows, a one-second countdown walks the current row down
//! the schedule, and the operator records who entered the corridor, who was
//! late, and who never showed. Everything is persisted after every mutation,
//! so a crash mid-race loses at most the in-flight command.
//!
//! # Features
//!
//! - **Roster ingestion**: extract the embedded race object from an HTML
//!   export and normalize it
//! - **Timeline derivation**: rows, intervals and the elapsed-time-to-row
//!   step function, re-derived live from the roster
//! - **Countdown engine**: tokio tick task publishing snapshots through a
//!   watch channel
//! - **Roster reconciliation**: merge a corrected export into a running
//!   project without losing recorded statuses
//! - **Reports**: start-protocol summary with CSV and JSON exports
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use startgrid::StartGrid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = StartGrid::open("startgrid-data.json");
//!     let race = startgrid::parse_roster_html(&std::fs::read_to_string("entries.html")?)?;
//!
//!     let manager = grid.manager();
//!     manager.lock().unwrap().create_project(race)?;
//!
//!     let mut engine = grid.engine();
//!     engine.start()?;
//!     Ok(())
//! }
//! ```

mod clock;
mod error;
pub mod manager;
pub mod report;
pub mod roster;
pub mod status;
pub mod store;
pub mod timeline;
pub mod timer;
pub mod types;

use std::path::Path;
use std::sync::{Arc, Mutex};

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GridError, Result};
pub use manager::ProjectStateManager;
pub use report::{Report, ReportEntry, to_csv, to_json};
pub use roster::parse_roster_html;
pub use status::{StatusBoard, delay_minutes};
pub use store::{FileBackend, MemoryBackend, PersistenceStore, StorageBackend};
pub use timeline::{
    StartRow, build_rows, calculate_intervals, current_row_for, elapsed_to_row, format_hhmmss,
    max_corridors,
};
pub use timer::TimerEngine;
pub use types::*;

/// Unified entry point wiring a persistence store, the project manager and a
/// countdown engine together.
pub struct StartGrid {
    manager: Arc<Mutex<ProjectStateManager>>,
}

impl StartGrid {
    /// Open a grid backed by a JSON file at `path`. The file is created on
    /// first save; a corrupt file is replaced by an empty dataset.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_store(PersistenceStore::file(path.as_ref()), Arc::new(SystemClock))
    }

    /// Open a grid with no file backing. Used in tests and dry runs.
    pub fn in_memory() -> Self {
        Self::with_store(PersistenceStore::in_memory(), Arc::new(SystemClock))
    }

    /// Open a grid over an explicit store and clock.
    pub fn with_store(store: PersistenceStore, clock: Arc<dyn Clock>) -> Self {
        let manager = ProjectStateManager::new(store, clock);
        Self { manager: Arc::new(Mutex::new(manager)) }
    }

    /// Shared handle to the project manager.
    pub fn manager(&self) -> Arc<Mutex<ProjectStateManager>> {
        Arc::clone(&self.manager)
    }

    /// A countdown engine bound to this grid's manager. Each engine owns its
    /// own tick task; one per open project view is the intended shape.
    pub fn engine(&self) -> TimerEngine {
        TimerEngine::new(Arc::clone(&self.manager))
    }
}
