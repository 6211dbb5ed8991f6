//! Race roster structures
//!
//! These mirror the JSON object embedded in an exported roster document. Field
//! names match the export's snake_case layout so a parsed [`Race`] serializes
//! back to an interchangeable shape.

use serde::{Deserialize, Serialize};

/// Sentinel `start_time` value meaning "no assigned start time".
pub const NO_START_TIME: i64 = 0;

/// One race participant.
///
/// `start_time` is integer milliseconds since an arbitrary schedule zero, not
/// wall-clock time; [`NO_START_TIME`] marks an unscheduled participant.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Person {
    pub id: String,
    /// Race number, the primary identifier within a project.
    pub bib: u32,
    pub name: String,
    pub surname: String,
    pub birth_date: Option<String>,
    pub card_number: i64,
    pub comment: String,
    pub group_id: String,
    pub organization_id: Option<String>,
    pub qual: i32,
    pub sex: i32,
    /// Corridor ordering tie-break within a start row.
    pub start_group: i32,
    /// Start time in milliseconds; 0 means no assigned start time.
    pub start_time: i64,
    pub is_out_of_competition: bool,
    pub is_paid: bool,
    pub is_personal: bool,
    pub is_rented_card: bool,
    pub year: i32,
    /// Resolved from `group_id` during ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    /// Resolved from `organization_id` during ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}

impl Person {
    /// Whether the participant has an assigned start time.
    pub fn has_assigned_start(&self) -> bool {
        self.start_time > NO_START_TIME
    }
}

/// Competition group (class) a participant runs in.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub long_name: String,
    pub start_corridor: i32,
    pub start_interval: i64,
    pub count_person: u32,
}

/// Club or team a participant represents.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub code: String,
    pub country: String,
    pub region: String,
}

/// Course reference carried through from the roster export.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// Event-level metadata block of the roster export.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RaceInfo {
    pub chief_referee: String,
    pub description: String,
    pub end_datetime: String,
    pub location: String,
    pub race_type: i32,
    pub relay_leg_count: i32,
    pub secretary: String,
    pub start_datetime: String,
    pub title: String,
    pub url: String,
}

/// Normalized race roster as produced by the ingestor.
///
/// `persons` and `groups` are required by the ingestion contract; the
/// remaining collections default to empty when the export omits them.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Race {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub data: RaceInfo,
    pub groups: Vec<Group>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    pub persons: Vec<Person>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Race {
    /// Look up a participant by bib.
    pub fn person(&self, bib: u32) -> Option<&Person> {
        self.persons.iter().find(|p| p.bib == bib)
    }

    /// Mutable lookup by bib.
    pub fn person_mut(&mut self, bib: u32) -> Option<&mut Person> {
        self.persons.iter_mut().find(|p| p.bib == bib)
    }

    /// Bibs of participants without an assigned start time.
    pub fn unscheduled_bibs(&self) -> Vec<u32> {
        self.persons.iter().filter(|p| !p.has_assigned_start()).map(|p| p.bib).collect()
    }
}
