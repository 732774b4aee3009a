//! YAML frontmatter for meeting and note files.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref FRONTMATTER_RE: Regex = Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---\r?\n?").unwrap();
}

/// Splits a markdown file into its raw frontmatter block and body.
///
/// Files without a leading `---` block return `None` for the frontmatter and
/// the whole content as body.
pub fn split(content: &str) -> (Option<&str>, &str) {
    match FRONTMATTER_RE.captures(content) {
        Some(caps) => {
            let raw = caps.get(1).map(|m| m.as_str());
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            (raw, &content[end..])
        }
        None => (None, content),
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct MeetingFrontmatter {
    pub id: Option<String>,
    pub title: Option<String>,
    pub start: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub purpose: Option<String>,
    pub outcomes: Option<String>,
    pub action_items: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct NoteFrontmatter {
    pub title: Option<String>,
}

pub fn parse_meeting(raw: &str) -> Result<MeetingFrontmatter, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(MeetingFrontmatter::default());
    }
    serde_yaml::from_str(raw)
}

pub fn parse_note(raw: &str) -> Result<NoteFrontmatter, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(NoteFrontmatter::default());
    }
    serde_yaml::from_str(raw)
}

/// Parses a meeting start time.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (local time) and bare dates
/// (midnight local time).
pub fn parse_start(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Local.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_split_with_frontmatter() {
        let content = "---\ntitle: Standup\n---\nBody line\n";
        let (raw, body) = split(content);
        assert_eq!(raw, Some("title: Standup"));
        assert_eq!(body, "Body line\n");
    }

    #[test]
    fn test_split_without_frontmatter() {
        let (raw, body) = split("just text");
        assert!(raw.is_none());
        assert_eq!(body, "just text");
    }

    #[test]
    fn test_parse_meeting_fields() {
        let raw = "title: Sprint Planning\nstart: 2024-03-04 09:30\nlocation: Room 101\nattendees: [Alice, Bob]\npurpose: Plan next sprint";
        let fm = parse_meeting(raw).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Sprint Planning"));
        assert_eq!(fm.attendees, vec!["Alice", "Bob"]);
        assert_eq!(fm.location.as_deref(), Some("Room 101"));
        assert!(fm.outcomes.is_none());
    }

    #[test]
    fn test_parse_start_formats() {
        let dt = parse_start("2024-03-04 09:30").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 4));
        assert_eq!((dt.hour(), dt.minute()), (9, 30));

        assert!(parse_start("2024-03-04T09:30:00Z").is_some());
        assert!(parse_start("2024-03-04").is_some());
        assert!(parse_start("next tuesday").is_none());
    }
}
