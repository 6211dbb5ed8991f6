//! Project aggregate and persisted storage layout

use serde::{Deserialize, Serialize};

use super::race::Race;
use super::timer::TimerState;
use crate::status::StatusBoard;

/// Presentation preferences persisted with a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub auto_scroll_enabled: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self { auto_scroll_enabled: true }
    }
}

/// UI language persisted in global settings. Data only; the crate carries no
/// localized strings.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    En,
    Kk,
}

/// Aggregate root: one imported race event and everything recorded against it.
///
/// `no_start_time_bibs` is a durable record of which bibs had no assigned
/// start time at import or merge time. It is never recomputed from current
/// `start_time` values: a participant may be assigned a time later and must
/// still be tracked as originally unscheduled (excluded from the timed grid).
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Wall-clock milliseconds of creation.
    pub created_at: i64,
    /// Wall-clock milliseconds of the last persisted mutation.
    pub updated_at: i64,
    pub race_data: Race,
    pub statuses: StatusBoard,
    pub timer_state: TimerState,
    pub settings: ProjectSettings,
    #[serde(default)]
    pub no_start_time_bibs: Vec<u32>,
}

impl Project {
    /// Whether `bib` is tracked as originally unscheduled.
    pub fn is_unscheduled(&self, bib: u32) -> bool {
        self.no_start_time_bibs.contains(&bib)
    }
}

/// Global settings stored alongside the project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub language: Language,
    pub current_project_id: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self { language: Language::Ru, current_project_id: None }
    }
}

/// The single persisted blob: every project plus global settings.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub settings: GlobalSettings,
}
