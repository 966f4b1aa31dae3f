use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::data::Timestamp;
use crate::error::{ErrorKind, ValidationError};

const AWARE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|ts| ts.date()))
}

/// ISO-8601 with `T` or a space between date and time, optional seconds and
/// fraction, optional offset or `Z`.
pub fn parse_datetime(s: &str) -> Option<Timestamp> {
    let mut t = s.trim().to_string();
    if t.len() > 10 && t.as_bytes()[10] == b' ' {
        t.replace_range(10..11, "T");
    }
    if t.ends_with('Z') || t.ends_with('z') {
        t.pop();
        t.push_str("+00:00");
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&t, fmt) {
            return Some(Timestamp::Aware(dt));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&t, fmt) {
            return Some(Timestamp::Naive(dt));
        }
    }
    None
}

pub(crate) fn coerce_date(raw: &Value) -> Result<NaiveDate, ValidationError> {
    raw.as_str()
        .and_then(parse_date)
        .ok_or_else(|| ValidationError::invalid("Not a valid date string."))
}

pub(crate) fn coerce_datetime(raw: &Value, with_tz: Option<bool>) -> Result<Timestamp, ValidationError> {
    let ts = raw
        .as_str()
        .and_then(parse_datetime)
        .ok_or_else(|| ValidationError::invalid("Not a valid datetime string."))?;
    match (with_tz, ts.is_aware()) {
        (Some(true), false) => Err(ValidationError::with_kind(
            ErrorKind::Timezone,
            "Not support timezone-naive datetime.",
        )),
        (Some(false), true) => Err(ValidationError::with_kind(
            ErrorKind::Timezone,
            "Not support timezone-aware datetime.",
        )),
        _ => Ok(ts),
    }
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datetime_accepts_common_iso_shapes() {
        for s in [
            "2000-01-01T00:00:00",
            "2000-01-01 00:00:00",
            "2000-01-01T00:00",
            "2000-01-01T00:00:00.123",
        ] {
            assert!(matches!(parse_datetime(s), Some(Timestamp::Naive(_))), "{s}");
        }
        for s in ["2000-01-01T00:00:00Z", "2000-01-01T00:00:00+08:00", "2000-01-01T00:00:00+0800"] {
            assert!(matches!(parse_datetime(s), Some(Timestamp::Aware(_))), "{s}");
        }
        assert!(parse_datetime("2000-01-01").is_none());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn rendering_drops_zero_fraction() {
        let naive = parse_datetime("2000-01-01 00:00:00").unwrap();
        assert_eq!(naive.to_string(), "2000-01-01T00:00:00");
        let aware = parse_datetime("2000-01-01T00:00:00+08:00").unwrap();
        assert_eq!(aware.to_string(), "2000-01-01T00:00:00+08:00");
    }

    #[test]
    fn timezone_policy_is_enforced() {
        let err = coerce_datetime(&json!("2000-01-01T00:00:00"), Some(true)).unwrap_err();
        assert_eq!(err.to_string(), "Not support timezone-naive datetime.");
        let err = coerce_datetime(&json!("2000-01-01T00:00:00Z"), Some(false)).unwrap_err();
        assert_eq!(err.to_string(), "Not support timezone-aware datetime.");
        assert!(coerce_datetime(&json!("2000-01-01T00:00:00Z"), None).is_ok());
    }

    #[test]
    fn dates_are_plain_iso() {
        assert_eq!(format_date(&coerce_date(&json!("2000-01-31")).unwrap()), "2000-01-31");
        assert_eq!(
            coerce_date(&json!("2000-13-01")).unwrap_err().to_string(),
            "Not a valid date string."
        );
    }

    #[test]
    fn dates_keep_the_day_of_a_full_timestamp() {
        let want = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(coerce_date(&json!("2000-01-01T10:00:00")).unwrap(), want);
        assert_eq!(coerce_date(&json!("2000-01-01 23:30:00+08:00")).unwrap(), want);
        assert!(coerce_date(&json!("2000-01-01T25:00:00")).is_err());
    }
}
