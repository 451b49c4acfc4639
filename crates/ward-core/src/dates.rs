//! Date handling for EMR timestamps.
//!
//! The EMR emits `2024-07-02T10:15:00.000+0300` (no colon in the offset),
//! FHIR emits RFC 3339, and some fields carry a bare date.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Placeholder shown for missing values.
pub const PLACEHOLDER: &str = "--";

const EMR_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Parse a full timestamp in any of the formats the EMR uses.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    EMR_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok())
}

/// Calendar date of a timestamp or bare date, in the timestamp's own offset.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Some(dt) = parse_datetime(value) {
        return Some(dt.date_naive());
    }
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d"))
        .ok()
}

/// Whole days between two dates, ignoring order.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Days since `since` as of `today`, or `None` when the date does not parse.
pub fn days_since(since: &str, today: NaiveDate) -> Option<i64> {
    parse_date(since).map(|d| days_between(d, today))
}

/// `DD/MM/YYYY`, as printed on ward documents.
pub fn format_date(value: &str) -> Option<String> {
    parse_date(value).map(|d| d.format("%d/%m/%Y").to_string())
}

/// `DD-Mon-YYYY, HH:MM` for table cells, falling back to the placeholder.
pub fn format_table_datetime(value: Option<&str>) -> String {
    value
        .and_then(|v| {
            parse_datetime(v)
                .map(|dt| dt.format("%d-%b-%Y, %H:%M").to_string())
                .or_else(|| parse_date(v).map(|d| d.format("%d-%b-%Y").to_string()))
        })
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_emr_timestamp() {
        let dt = parse_datetime("2024-07-02T10:15:00.000+0300").unwrap();
        assert_eq!(dt.date_naive(), date(2024, 7, 2));
        assert_eq!(dt.offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn test_parse_rfc3339_and_bare_date() {
        assert_eq!(parse_date("2024-07-02T23:00:00+00:00"), Some(date(2024, 7, 2)));
        assert_eq!(parse_date("2024-07-02"), Some(date(2024, 7, 2)));
        assert_eq!(parse_date("2024-07-02 08:30:00"), Some(date(2024, 7, 2)));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_days_between_is_absolute() {
        assert_eq!(days_between(date(2024, 7, 1), date(2024, 7, 4)), 3);
        assert_eq!(days_between(date(2024, 7, 4), date(2024, 7, 1)), 3);
        assert_eq!(days_since("2024-07-01T08:00:00.000+0300", date(2024, 7, 1)), Some(0));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_date("2021-07-02T08:00:00.000+0300").as_deref(), Some("02/07/2021"));
        assert_eq!(
            format_table_datetime(Some("2024-07-02T10:15:00.000+0300")),
            "02-Jul-2024, 10:15"
        );
        assert_eq!(format_table_datetime(None), PLACEHOLDER);
    }
}
