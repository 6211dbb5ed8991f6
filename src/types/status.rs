//! Participant status records

use serde::{Deserialize, Serialize};

/// Status an operator can assign to a participant at the start line.
///
/// A missing record is equivalent to [`StatusKind::NotSet`].
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    #[default]
    NotSet,
    Entered,
    Late,
    Absent,
}

impl StatusKind {
    /// Stable lowercase name, matching the persisted representation.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::NotSet => "not_set",
            StatusKind::Entered => "entered",
            StatusKind::Late => "late",
            StatusKind::Absent => "absent",
        }
    }
}

/// One status record, stamped with the wall-clock instant it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatus {
    pub status: StatusKind,
    /// Wall-clock milliseconds at which the status was applied.
    pub timestamp: i64,
    /// Whole minutes of delay; only meaningful for [`StatusKind::Late`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
}

impl ParticipantStatus {
    /// Record without delay information.
    pub fn new(status: StatusKind, timestamp: i64) -> Self {
        Self { status, timestamp, delay_minutes: None }
    }

    /// Late record carrying the computed delay.
    pub fn late(timestamp: i64, delay_minutes: u32) -> Self {
        Self { status: StatusKind::Late, timestamp, delay_minutes: Some(delay_minutes) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&StatusKind::NotSet).unwrap(), r#""not_set""#);
        assert_eq!(serde_json::to_string(&StatusKind::Entered).unwrap(), r#""entered""#);
        assert_eq!(serde_json::to_string(&StatusKind::Late).unwrap(), r#""late""#);
        assert_eq!(serde_json::to_string(&StatusKind::Absent).unwrap(), r#""absent""#);
    }

    #[test]
    fn delay_minutes_omitted_unless_set() {
        let entered = ParticipantStatus::new(StatusKind::Entered, 1_000);
        let json = serde_json::to_string(&entered).unwrap();
        assert!(!json.contains("delayMinutes"));

        let late = ParticipantStatus::late(1_000, 3);
        let json = serde_json::to_string(&late).unwrap();
        assert!(json.contains(r#""delayMinutes":3"#));
    }
}
