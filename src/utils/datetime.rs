// Timezone handling: expenses are entered and displayed in IST, stored in UTC

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use chrono_tz::Tz;

use crate::error::{AppError, Result};

/// Timezone assumed for naive timestamps
pub const IST: Tz = Kolkata;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

/// Current time in IST as ISO-8601 with offset, e.g. 2024-03-10T12:30:00.123+05:30
pub fn now_ist_iso() -> String {
    Utc::now().with_timezone(&IST).to_rfc3339()
}

/// Render a stored instant in IST
pub fn to_ist(dt: &DateTime<Utc>) -> DateTime<Tz> {
    dt.with_timezone(&IST)
}

/// Display form used for expense listings
pub fn format_ist(dt: &DateTime<Utc>) -> String {
    to_ist(dt).format("%Y-%m-%d %H:%M").to_string()
}

/// Interpret a naive timestamp in `assume_tz` and convert to UTC
pub fn to_utc(naive: &NaiveDateTime, assume_tz: &Tz) -> DateTime<Utc> {
    assume_tz
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Only reachable for zones with gaps; IST has none
        .unwrap_or_else(|| Utc.from_utc_datetime(naive))
}

fn parse_with_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(naive);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse an ISO-8601 string to UTC. Naive values are assumed to be in `default_tz`.
pub fn try_parse_to_utc(value: &str, default_tz: &Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Some(dt) = parse_with_offset(value) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive(value).map(|naive| to_utc(&naive, default_tz))
}

/// Lenient parse of model output: unparsable values fall back to the current time
pub fn parse_to_utc(value: &str) -> DateTime<Utc> {
    match try_parse_to_utc(value, &IST) {
        Some(dt) => dt,
        None => {
            tracing::warn!("Unparsable datetime from model output: {:?}, using now", value);
            Utc::now()
        }
    }
}

/// Strict parse of user-supplied timestamps
pub fn parse_user_datetime(value: &str) -> Result<DateTime<Utc>> {
    try_parse_to_utc(value, &IST).ok_or_else(|| {
        AppError::invalid(
            "datetime",
            format!("'{}' is not an ISO-8601 date or date-time", value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_offset_timestamp_is_converted() {
        assert_eq!(
            parse_to_utc("2024-03-10T12:30:00+05:30"),
            utc("2024-03-10T07:00:00Z")
        );
        assert_eq!(
            parse_to_utc("2024-03-10T12:30:00Z"),
            utc("2024-03-10T12:30:00Z")
        );
        assert_eq!(
            parse_to_utc("2024-03-10 09:00:00-04:00"),
            utc("2024-03-10T13:00:00Z")
        );
    }

    #[test]
    fn test_naive_timestamp_assumes_ist() {
        assert_eq!(
            parse_to_utc("2024-03-10T12:30:00"),
            utc("2024-03-10T07:00:00Z")
        );
        assert_eq!(
            parse_to_utc("2024-03-10T12:30:00.250"),
            utc("2024-03-10T07:00:00.250Z")
        );
        assert_eq!(parse_to_utc("2024-03-10 12:30"), utc("2024-03-10T07:00:00Z"));
        // Date-only means midnight IST
        assert_eq!(parse_to_utc("2024-03-10"), utc("2024-03-09T18:30:00Z"));
    }

    #[test]
    fn test_garbage_falls_back_to_now() {
        let before = Utc::now();
        let parsed = parse_to_utc("yesterday-ish");
        assert!(parsed >= before - Duration::seconds(1));
        assert!(parsed <= Utc::now() + Duration::seconds(1));
    }

    #[test]
    fn test_strict_parse_rejects_garbage() {
        assert!(parse_user_datetime("not a date").is_err());
        assert_eq!(
            parse_user_datetime("2024-01-31T23:00").unwrap(),
            utc("2024-01-31T17:30:00Z")
        );
    }

    #[test]
    fn test_ist_rendering() {
        let stored = utc("2024-03-09T18:30:00Z");
        assert_eq!(format_ist(&stored), "2024-03-10 00:00");
        assert!(now_ist_iso().ends_with("+05:30"));
    }
}
