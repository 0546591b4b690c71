//! Raw reading models for the two station networks.
//!
//! Readings are immutable facts as they come out of the reading store.
//! Timestamps are kept as naive wall-clock values because both networks
//! report in the local time of the stations. Numeric fields are optional
//! everywhere: a missing or malformed value becomes `None`, never a crash.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---

/// The two station networks feeding the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Municipal civil-defence telemetry (live cumulative/instantaneous fields).
    Municipal,
    /// National rain-gauge network (upstream pre-aggregated rolling sums).
    National,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Municipal => write!(f, "municipal"),
            Source::National => write!(f, "national"),
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "municipal" | "defesa" | "defesa_civil" => Ok(Source::Municipal),
            "national" | "cemaden" => Ok(Source::National),
            other => Err(format!("unknown source {other:?}")),
        }
    }
}

/// One row of the municipal network.
///
/// `rain_cumulative` is a counter since an unspecified epoch, not the rain
/// that fell since the previous row. It may reset to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalReading {
    // ---
    pub station_name: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub air_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wind_direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_cumulative: Option<f64>,
}

/// One row of the national rain-gauge network.
///
/// The window fields are rolling sums computed by the upstream provider and
/// are consumed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalReading {
    // ---
    pub station_name: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_mm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_1h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_6h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_12h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rain_24h: Option<f64>,
}

// ---

/// Coerce free text to a finite number.
///
/// Surrounding whitespace is ignored. Empty strings, non-numeric text and
/// non-finite results (`NaN`, `inf`) are rejected.
pub fn coerce_numeric(raw: &str) -> Result<f64, CoreError> {
    // ---
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CoreError::MalformedValue {
            value: raw.to_string(),
        }),
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a reading timestamp.
///
/// Accepts ISO-8601 with either `T` or a space as separator, optional
/// seconds and fractions, and offset-qualified forms. When an offset is
/// present it is dropped and the local wall time is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

// ---

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    Ok(match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Number(v) => v.is_finite().then_some(v),
        LenientNumber::Text(s) => coerce_numeric(&s).ok(),
        LenientNumber::Other(_) => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp {raw:?}")))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_coerce_numeric_accepts_padded_numbers() {
        // ---
        assert_eq!(coerce_numeric(" 12.5 "), Ok(12.5));
        assert_eq!(coerce_numeric("-3"), Ok(-3.0));
    }

    #[test]
    fn test_coerce_numeric_rejects_garbage() {
        // ---
        assert!(coerce_numeric("").is_err());
        assert!(coerce_numeric("n/a").is_err());
        assert!(coerce_numeric("NaN").is_err());
        assert!(coerce_numeric("inf").is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        // ---
        assert_eq!(parse_timestamp("2025-03-26 18:45:00"), Some(at(18, 45, 0)));
        assert_eq!(parse_timestamp("2025-03-26T18:45:00"), Some(at(18, 45, 0)));
        assert_eq!(parse_timestamp("2025-03-26 18:45"), Some(at(18, 45, 0)));
        assert_eq!(
            parse_timestamp("2025-03-26T18:45:30.250"),
            NaiveDate::from_ymd_opt(2025, 3, 26)
                .unwrap()
                .and_hms_milli_opt(18, 45, 30, 250)
        );
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_timestamp_keeps_local_wall_time() {
        // ---
        // Manaus is UTC-4; the offset is dropped, the wall time is kept.
        assert_eq!(
            parse_timestamp("2025-03-26T18:45:00-04:00"),
            Some(at(18, 45, 0))
        );
        assert_eq!(
            parse_timestamp("2025-03-26 18:45:00-04"),
            Some(at(18, 45, 0))
        );
    }

    #[test]
    fn test_municipal_reading_tolerates_malformed_and_missing_fields() {
        // ---
        let json = r#"{
            "station_name": "EST_MINDU",
            "timestamp": "2025-03-26 18:45:00",
            "air_temperature": "29.4",
            "relative_humidity": "sensor fault",
            "pressure": null,
            "rain_cumulative": 12
        }"#;
        let reading: MunicipalReading = serde_json::from_str(json).expect("lenient parse");

        assert_eq!(reading.air_temperature, Some(29.4));
        assert_eq!(reading.relative_humidity, None);
        assert_eq!(reading.pressure, None);
        assert_eq!(reading.wind_speed, None);
        assert_eq!(reading.rain_cumulative, Some(12.0));
    }

    #[test]
    fn test_reading_with_bad_timestamp_is_rejected() {
        // ---
        let json = r#"{"station_name": "X", "timestamp": "yesterday"}"#;
        assert!(serde_json::from_str::<NationalReading>(json).is_err());
    }

    #[test]
    fn test_source_parsing_accepts_legacy_table_names() {
        // ---
        assert_eq!("cemaden".parse::<Source>(), Ok(Source::National));
        assert_eq!("Defesa".parse::<Source>(), Ok(Source::Municipal));
        assert!("forecast".parse::<Source>().is_err());
    }
}
