//! `lastmod` parsing and canonical UTC formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

/// Parses the date formats a sitemap source is likely to hand over.
///
/// Date-only and offset-less values are taken as UTC.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(input).ok().map(|date| date.with_timezone(&Utc))
}

/// Re-formats any parseable date string canonically; `None` when unparseable.
pub fn normalise_date(input: &str) -> Option<String> {
    parse_date(input).map(|date| format_date(&date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_date_only() {
        assert_eq!(normalise_date("2024-01-01").as_deref(), Some("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn test_normalise_converts_offsets_to_utc() {
        assert_eq!(
            normalise_date("2024-03-10T12:30:00+02:00").as_deref(),
            Some("2024-03-10T10:30:00+00:00")
        );
        assert_eq!(normalise_date("2024-03-10T12:30:00.123Z").as_deref(), Some("2024-03-10T12:30:00+00:00"));
    }

    #[test]
    fn test_normalise_rfc2822() {
        assert_eq!(
            normalise_date("Tue, 1 Jul 2003 10:52:37 +0200").as_deref(),
            Some("2003-07-01T08:52:37+00:00")
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(normalise_date(""), None);
        assert_eq!(normalise_date("yesterday"), None);
        assert_eq!(normalise_date("2024-13-45"), None);
    }
}
