//! Core data model for the start-timeline engine.
//!
//! The persisted types follow the storage schema of the entry-system exports
//! they interoperate with:
//!
//! - Roster types ([`Race`], [`Person`], [`Group`], [`Organization`]) use the
//!   export's snake_case field names.
//! - Aggregate types ([`Project`], [`TimerState`], [`ParticipantStatus`],
//!   [`StoredData`]) use camelCase field names.
//!
//! Everything temporal is integer milliseconds: participant `start_time`
//! values count from an arbitrary schedule zero (0 is the "no start time"
//! sentinel), while timer anchors and status timestamps are wall-clock
//! milliseconds since the Unix epoch.

mod project;
mod race;
mod status;
mod timer;

pub use project::{GlobalSettings, Language, Project, ProjectSettings, StoredData};
pub use race::{Course, Group, NO_START_TIME, Organization, Person, Race, RaceInfo};
pub use status::{ParticipantStatus, StatusKind};
pub use timer::{TimerSnapshot, TimerState};
