//! Start-protocol reports and exports.
//!
//! Everything here is a pure read over a [`Project`]: the summary counts who
//! entered, who was late (and by how much), who never showed, and who was
//! never marked at all. The CSV and JSON renderings are what gets handed to
//! the event secretary after the last start.

use serde::Serialize;

use crate::error::Result;
use crate::timeline::format_hhmmss;
use crate::types::{Person, Project, StatusKind};

/// One participant line in a report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub bib: u32,
    pub name: String,
    pub surname: String,
    pub group: String,
    /// Scheduled start in schedule milliseconds; 0 for unscheduled entries.
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
}

impl ReportEntry {
    fn from_person(person: &Person, delay_minutes: Option<u32>) -> Self {
        Self {
            bib: person.bib,
            name: person.name.clone(),
            surname: person.surname.clone(),
            group: person.group.as_ref().map(|g| g.name.clone()).unwrap_or_default(),
            start_time: person.start_time,
            delay_minutes,
        }
    }
}

/// Aggregated start protocol for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub project_name: String,
    pub race_title: String,
    pub total_participants: usize,
    pub entered: usize,
    pub late: Vec<ReportEntry>,
    pub absent: Vec<ReportEntry>,
    pub not_marked: Vec<ReportEntry>,
}

impl Report {
    /// Build the report from the project's roster and status board.
    pub fn generate(project: &Project) -> Self {
        let mut entered = 0;
        let mut late = Vec::new();
        let mut absent = Vec::new();
        let mut not_marked = Vec::new();

        for person in &project.race_data.persons {
            let record = project.statuses.record(person.bib);
            match record.map(|r| r.status).unwrap_or_default() {
                StatusKind::Entered => entered += 1,
                StatusKind::Late => {
                    let delay = record.and_then(|r| r.delay_minutes);
                    late.push(ReportEntry::from_person(person, delay));
                }
                StatusKind::Absent => absent.push(ReportEntry::from_person(person, None)),
                StatusKind::NotSet => not_marked.push(ReportEntry::from_person(person, None)),
            }
        }

        for section in [&mut late, &mut absent, &mut not_marked] {
            section.sort_by_key(|entry| entry.bib);
        }

        Self {
            project_name: project.name.clone(),
            race_title: project.race_data.data.title.clone(),
            total_participants: project.race_data.persons.len(),
            entered,
            late,
            absent,
            not_marked,
        }
    }

    /// Plain-text summary grouped by status category.
    pub fn to_text_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} / {}\n", self.project_name, self.race_title));
        out.push_str(&format!("participants: {}\n", self.total_participants));
        out.push_str(&format!("entered:      {}\n", self.entered));
        out.push_str(&format!("late:         {}\n", self.late.len()));
        out.push_str(&format!("absent:       {}\n", self.absent.len()));
        out.push_str(&format!("not marked:   {}\n", self.not_marked.len()));

        for (title, entries) in
            [("late", &self.late), ("absent", &self.absent), ("not marked", &self.not_marked)]
        {
            if entries.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{title}:\n"));
            for entry in entries {
                let start = format_hhmmss(entry.start_time);
                match entry.delay_minutes {
                    Some(delay) => out.push_str(&format!(
                        "  {} {} {} ({}) start {} +{} min\n",
                        entry.bib, entry.name, entry.surname, entry.group, start, delay
                    )),
                    None => out.push_str(&format!(
                        "  {} {} {} ({}) start {}\n",
                        entry.bib, entry.name, entry.surname, entry.group, start
                    )),
                }
            }
        }
        out
    }
}

/// Render the full participant list as CSV, one row per person.
pub fn to_csv(project: &Project) -> String {
    let mut out = String::from("Bib,Name,Surname,Group,Status,DelayMinutes\n");

    let mut persons: Vec<&Person> = project.race_data.persons.iter().collect();
    persons.sort_by_key(|p| p.bib);

    for person in persons {
        let record = project.statuses.record(person.bib);
        let status = record.map(|r| r.status).unwrap_or_default();
        let delay = record
            .and_then(|r| r.delay_minutes)
            .map(|d| d.to_string())
            .unwrap_or_default();
        let group = person.group.as_ref().map(|g| g.name.as_str()).unwrap_or("");

        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            person.bib,
            csv_field(&person.name),
            csv_field(&person.surname),
            csv_field(group),
            status.as_str(),
            delay,
        ));
    }
    out
}

/// Render the project as a self-contained JSON export: roster, statuses,
/// report and an RFC 3339 export timestamp.
pub fn to_json(project: &Project, now_ms: i64) -> Result<String> {
    let export = serde_json::json!({
        "exportTime": rfc3339(now_ms),
        "project": {
            "id": project.id,
            "name": project.name,
            "createdAt": project.created_at,
            "updatedAt": project.updated_at,
        },
        "race": project.race_data,
        "statuses": project.statuses,
        "report": Report::generate(project),
    });
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Quote a CSV field when it needs it; embedded quotes are doubled.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn rfc3339(now_ms: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(now_ms) * 1_000_000)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
