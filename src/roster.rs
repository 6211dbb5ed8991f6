//! Roster ingestion from exported HTML documents.
//!
//! The roster arrives as an HTML report with the full race object embedded in
//! a script assignment:
//!
//! ```text
//! <script>
//!   var race = { "id": "...", "persons": [...], "groups": [...] };
//! </script>
//! ```
//!
//! Ingestion extracts the object text by brace matching (no script execution),
//! normalizes raw control characters the exporter leaves inside string
//! literals, parses the JSON, and resolves each participant's group and
//! organization references. Any failure maps to [`GridError::RosterParse`];
//! the parser never panics past its boundary and never mutates state.

use tracing::{debug, warn};

use crate::error::{GridError, Result};
use crate::types::Race;

/// Parse an exported roster document into a normalized [`Race`].
pub fn parse_roster_html(html: &str) -> Result<Race> {
    let payload = extract_race_object(html)?;
    let payload = escape_control_characters(&payload);

    let mut race: Race = serde_json::from_str(&payload).map_err(|e| {
        warn!("roster payload failed to parse: {e}");
        GridError::roster_parse_with_source("embedded race object is not valid JSON", Box::new(e))
    })?;

    link_references(&mut race);

    debug!(
        race_id = %race.id,
        persons = race.persons.len(),
        groups = race.groups.len(),
        "parsed roster document"
    );

    Ok(race)
}

/// Locate the `var race = {...};` assignment and return the object text.
///
/// Brace matching tracks string literals and escapes, so braces inside
/// participant names or comments do not terminate the scan early.
fn extract_race_object(html: &str) -> Result<String> {
    let assign = find_race_assignment(html)
        .ok_or_else(|| GridError::roster_parse("no 'var race = {...};' assignment found"))?;

    let open = html[assign..]
        .find('{')
        .map(|i| assign + i)
        .ok_or_else(|| GridError::roster_parse("race assignment has no object literal"))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in html[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(html[open..open + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    Err(GridError::roster_parse("race object literal is unterminated"))
}

/// Find the byte offset of a `var race =` assignment, tolerating arbitrary
/// whitespace between the tokens.
fn find_race_assignment(html: &str) -> Option<usize> {
    let mut from = 0usize;

    while let Some(rel) = html[from..].find("var") {
        let at = from + rel;
        from = at + 3;

        // Reject identifiers that merely contain "var" or "race".
        if html[..at].ends_with(|c: char| c.is_alphanumeric() || c == '_') {
            continue;
        }
        let tail = &html[at + 3..];
        if !tail.starts_with(|c: char| c.is_whitespace()) {
            continue;
        }
        if let Some(after) = tail.trim_start().strip_prefix("race") {
            if after.starts_with(|c: char| c.is_whitespace() || c == '=')
                && after.trim_start().starts_with('=')
            {
                return Some(at);
            }
        }
    }

    None
}

/// Escape raw control characters inside JSON string literals.
///
/// The exporter writes participant comments verbatim, so a multi-line comment
/// puts a literal newline inside a string, which is invalid JSON. Whitespace
/// between tokens is left alone.
fn escape_control_characters(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in payload.chars() {
        if in_string {
            if escaped {
                escaped = false;
                result.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    result.push(ch);
                }
                '"' => {
                    in_string = false;
                    result.push(ch);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                '\x00'..='\x1f' => {
                    // Remaining control characters have no short escape.
                    result.push_str(&format!("\\u{:04x}", ch as u32));
                }
                _ => result.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            result.push(ch);
        }
    }

    result
}

/// Resolve `group_id` / `organization_id` references into embedded copies.
fn link_references(race: &mut Race) {
    let groups = race.groups.clone();
    let organizations = race.organizations.clone();

    for person in &mut race.persons {
        person.group = groups.iter().find(|g| g.id == person.group_id).cloned();
        person.organization = person
            .organization_id
            .as_ref()
            .and_then(|id| organizations.iter().find(|o| &o.id == id))
            .cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html><head><title>Start list</title></head>
<body>
<script>
var race = {"id":"race-1","object":"race","courses":[],
"data":{"title":"Spring Cup","start_datetime":"2026-05-01 11:00:00",
"chief_referee":"","description":"","end_datetime":"","location":"",
"race_type":0,"relay_leg_count":1,"secretary":"","url":""},
"groups":[{"id":"g1","name":"M21","long_name":"Men 21","start_corridor":1,
"start_interval":60000,"count_person":2}],
"organizations":[{"id":"o1","name":"Forest OK","contact":"","code":"",
"country":"","region":""}],
"persons":[
{"id":"p1","bib":101,"name":"Anna","surname":"Berg","birth_date":null,
"card_number":500101,"comment":"","group_id":"g1","organization_id":"o1",
"qual":0,"sex":0,"start_group":1,"start_time":0,
"is_out_of_competition":false,"is_paid":true,"is_personal":false,
"is_rented_card":false,"year":1995},
{"id":"p2","bib":102,"name":"Olle","surname":"Krav","birth_date":null,
"card_number":500102,"comment":"","group_id":"g1","organization_id":null,
"qual":0,"sex":1,"start_group":2,"start_time":600000,
"is_out_of_competition":false,"is_paid":true,"is_personal":false,
"is_rented_card":false,"year":1990}],
"results":[],"settings":{}};
</script>
</body></html>"#;

    #[test]
    fn parses_embedded_race_object() {
        let race = parse_roster_html(SAMPLE).unwrap();

        assert_eq!(race.id, "race-1");
        assert_eq!(race.data.title, "Spring Cup");
        assert_eq!(race.persons.len(), 2);
        assert_eq!(race.unscheduled_bibs(), vec![101]);
    }

    #[test]
    fn resolves_group_and_organization_references() {
        let race = parse_roster_html(SAMPLE).unwrap();

        let anna = race.person(101).unwrap();
        assert_eq!(anna.group.as_ref().unwrap().name, "M21");
        assert_eq!(anna.organization.as_ref().unwrap().name, "Forest OK");

        let olle = race.person(102).unwrap();
        assert!(olle.group.is_some());
        assert!(olle.organization.is_none());
    }

    #[test]
    fn missing_assignment_is_a_parse_error() {
        let err = parse_roster_html("<html><body>no roster here</body></html>").unwrap_err();
        assert!(matches!(err, GridError::RosterParse { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let html = "<script>var race = {\"persons\": [}; </script>";
        let err = parse_roster_html(html).unwrap_err();
        assert!(matches!(err, GridError::RosterParse { .. }));
    }

    #[test]
    fn missing_persons_array_is_a_parse_error() {
        let html = r#"<script>var race = {"id":"x","groups":[]};</script>"#;
        let err = parse_roster_html(html).unwrap_err();
        assert!(matches!(err, GridError::RosterParse { .. }));
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_scan() {
        let html = r#"<script>var race = {"id":"r{}","groups":[],
"persons":[{"id":"p","bib":1,"name":"A {b}","surname":"C","group_id":"",
"start_group":1,"start_time":0}]};</script>"#;
        let race = parse_roster_html(html).unwrap();
        assert_eq!(race.id, "r{}");
        assert_eq!(race.persons[0].name, "A {b}");
    }

    #[test]
    fn raw_control_characters_in_strings_are_escaped() {
        let html = "<script>var race = {\"id\":\"r1\",\"groups\":[],\
\"persons\":[{\"id\":\"p\",\"bib\":1,\"name\":\"line\none\",\"surname\":\"s\",\
\"group_id\":\"\",\"start_group\":1,\"start_time\":0,\"comment\":\"a\tb\"}]};</script>";
        let race = parse_roster_html(html).unwrap();
        assert_eq!(race.persons[0].name, "line\none");
        assert_eq!(race.persons[0].comment, "a\tb");
    }

    #[test]
    fn unterminated_object_is_a_parse_error() {
        let html = r#"<script>var race = {"id":"r1","persons":["#;
        let err = parse_roster_html(html).unwrap_err();
        assert!(matches!(err, GridError::RosterParse { .. }));
    }
}
