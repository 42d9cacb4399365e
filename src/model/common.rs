use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

pub type Id = Uuid;

pub type Timestamp = DateTime<Utc>;

pub fn generate_id() -> Id {
    Uuid::new_v4()
}

/// Canonical wire form for timestamps: RFC 3339, UTC, microsecond precision.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_round_trip_keeps_microseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
            + chrono::Duration::microseconds(1234);
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2024-03-01T08:30:00.001234Z");
        assert_eq!(parse_timestamp(&formatted), Some(ts));
    }

    #[test]
    fn test_parse_timestamp_normalizes_offsets() {
        let parsed = parse_timestamp("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&parsed), "2024-03-01T08:30:00.000000Z");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
