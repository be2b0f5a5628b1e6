//! Formatting helpers for text output.

use crate::types::Contact;
use chrono::{DateTime, Utc};

/// Placeholder for a missing value.
pub const MISSING: &str = "-";

/// Format a timestamp relative to `now` (e.g., "2m ago").
///
/// Anything older than a week is shown as a date.
pub fn format_relative_time_at(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    format_relative_time_at(ts, Utc::now())
}

/// Format an optional timestamp as relative time, or [`MISSING`].
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => MISSING.to_string(),
    }
}

/// Absolute timestamp for thread listings, e.g. "2024-05-22 21:48:32".
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => MISSING.to_string(),
    }
}

/// "Me (+2222), Tony (+333)"
pub fn format_contacts(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "(no participants)".to_string();
    }
    contacts
        .iter()
        .map(Contact::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// First line of `text`, cut to `max` characters with a trailing ellipsis.
pub fn truncate_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(format_relative_time_at(now + Duration::seconds(5), now), "just now");
        assert_eq!(format_relative_time_at(now - Duration::seconds(30), now), "30s ago");
        assert_eq!(format_relative_time_at(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_relative_time_at(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time_at(now - Duration::days(2), now), "2d ago");

        let old = DateTime::parse_from_rfc3339("2018-07-23T16:23:31Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_relative_time_at(old, now), "2018-07-23");
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(format_relative_time_opt(None), MISSING);
        assert_eq!(format_timestamp(None), MISSING);
    }

    #[test]
    fn test_format_contacts() {
        let contacts = vec![
            Contact {
                id: 1,
                name: "Me".to_string(),
                phone_number: "+2222".to_string(),
            },
            Contact {
                id: 2,
                name: "Sillio Sanford".to_string(),
                phone_number: String::new(),
            },
        ];
        assert_eq!(format_contacts(&contacts), "Me (+2222), Sillio Sanford");
        assert_eq!(format_contacts(&[]), "(no participants)");
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("short", 10), "short");
        assert_eq!(truncate_line("first\nsecond", 10), "first");
        assert_eq!(truncate_line("Hahahaha I love all of these", 10), "Hahahah...");
    }
}
