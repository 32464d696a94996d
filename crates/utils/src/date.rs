//! Date handling for task schedules.
//!
//! Dates are kept as [`NaiveDate`] and only formatted at the edges. Inbound
//! payloads still arrive in whatever shape the browser produced, so parsing is
//! lenient: ISO `2025-01-31`, US display `1/31/2025`, or a full RFC 3339
//! timestamp (only the calendar date is kept).

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Deserializer, de};

const ACCEPTED_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Today's date in the server's local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// `deserialize_with` helper for `Option<NaiveDate>` fields.
///
/// `null`, a missing field and `""` all become `None`.
pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unrecognised date: {value}"))),
    }
}

/// `deserialize_with` helper treating `""` like an absent value for any
/// `FromStr` type. HTML selects submit an empty string for "nothing chosen".
pub fn deserialize_empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "deserialize_optional_date")]
        due: Option<NaiveDate>,
        #[serde(default, deserialize_with = "deserialize_empty_as_none")]
        count: Option<u32>,
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(parse_date("2025-01-05"), Some(expected));
        assert_eq!(parse_date("1/5/2025"), Some(expected));
        assert_eq!(parse_date("01/05/2025"), Some(expected));
        assert_eq!(parse_date("2025-01-05T10:30:00Z"), Some(expected));
        assert_eq!(parse_date("  "), None);
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let payload: Payload = serde_json::from_str(r#"{"due": "", "count": ""}"#).unwrap();
        assert!(payload.due.is_none());
        assert!(payload.count.is_none());

        let payload: Payload = serde_json::from_str("{}").unwrap();
        assert!(payload.due.is_none());
        assert!(payload.count.is_none());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let result: Result<Payload, _> = serde_json::from_str(r#"{"due": "soon"}"#);
        assert!(result.is_err());
    }
}
