//! Schema alignment of the two networks into one tidy record shape.
//!
//! No values are derived here. Municipal rows carry the raw counter and
//! instantaneous fields; national rows carry the per-reading interval
//! amount and the rolling sums computed upstream, which are consumed as-is.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{MunicipalReading, NationalReading, Source};
use crate::normalize::{CanonicalStation, Normalizer};
use crate::windows::RainWindows;

// ---

/// A borrowed batch of raw rows from one network.
#[derive(Debug, Clone, Copy)]
pub enum SourceBatch<'a> {
    Municipal(&'a [MunicipalReading]),
    National(&'a [NationalReading]),
}

impl SourceBatch<'_> {
    pub fn source(&self) -> Source {
        match self {
            SourceBatch::Municipal(_) => Source::Municipal,
            SourceBatch::National(_) => Source::National,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SourceBatch::Municipal(rows) => rows.len(),
            SourceBatch::National(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a rain value should be read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "mm", rename_all = "snake_case")]
pub enum RainValue {
    /// Counter since an unspecified epoch; needs reconstruction.
    Cumulative(f64),
    /// Rain that fell during the reading's own interval.
    Interval(f64),
}

/// Common row shape shared by both networks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRecord {
    pub canonical_station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    pub source: Source,
    pub rain: Option<RainValue>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub pressure: Option<f64>,
    /// Rolling sums as reported by the national network.
    pub upstream_windows: Option<RainWindows>,
}

/// Align a batch to [`TidyRecord`]s, preserving input order.
pub fn unify(batch: SourceBatch<'_>, normalizer: &Normalizer) -> Vec<TidyRecord> {
    // ---
    match batch {
        SourceBatch::Municipal(rows) => rows
            .iter()
            .map(|r| from_municipal(r, normalizer))
            .collect(),
        SourceBatch::National(rows) => rows
            .iter()
            .map(|r| from_national(r, normalizer))
            .collect(),
    }
}

pub fn from_municipal(r: &MunicipalReading, normalizer: &Normalizer) -> TidyRecord {
    TidyRecord {
        canonical_station: normalizer.canonical(&r.station_name),
        timestamp: r.timestamp,
        source: Source::Municipal,
        rain: r.rain_cumulative.map(RainValue::Cumulative),
        temperature: r.air_temperature,
        humidity: r.relative_humidity,
        wind_speed: r.wind_speed,
        wind_direction: r.wind_direction,
        pressure: r.pressure,
        upstream_windows: None,
    }
}

pub fn from_national(r: &NationalReading, normalizer: &Normalizer) -> TidyRecord {
    TidyRecord {
        canonical_station: normalizer.canonical(&r.station_name),
        timestamp: r.timestamp,
        source: Source::National,
        rain: r.rain_mm.map(RainValue::Interval),
        temperature: None,
        humidity: None,
        wind_speed: None,
        wind_direction: None,
        pressure: None,
        upstream_windows: Some(upstream_windows(r)),
    }
}

/// Upstream rolling sums; a missing or non-numeric sum counts as `0`.
pub fn upstream_windows(r: &NationalReading) -> RainWindows {
    let or_zero = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
    RainWindows {
        h1: or_zero(r.rain_1h),
        h6: or_zero(r.rain_6h),
        h12: or_zero(r.rain_12h),
        h24: or_zero(r.rain_24h),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_municipal_rows_keep_counter_semantics() {
        // ---
        let rows = vec![MunicipalReading {
            station_name: "DEFESA CIVIL - EST_MINDU".to_string(),
            timestamp: ts(),
            air_temperature: Some(31.0),
            relative_humidity: Some(60.0),
            pressure: None,
            wind_speed: Some(2.5),
            wind_direction: Some(90.0),
            rain_cumulative: Some(12.4),
        }];
        let tidy = unify(SourceBatch::Municipal(&rows), &Normalizer::default());
        assert_eq!(tidy.len(), 1);
        assert_eq!(tidy[0].canonical_station.as_str(), "EST_MINDU");
        assert_eq!(tidy[0].rain, Some(RainValue::Cumulative(12.4)));
        assert_eq!(tidy[0].temperature, Some(31.0));
        assert_eq!(tidy[0].pressure, None);
        assert!(tidy[0].upstream_windows.is_none());
    }

    #[test]
    fn test_national_rows_pass_upstream_windows_through() {
        // ---
        let rows = vec![NationalReading {
            station_name: "CEMADEN - Flores (Zona Norte)".to_string(),
            timestamp: ts(),
            rain_mm: Some(0.4),
            rain_1h: Some(1.2),
            rain_6h: None,
            rain_12h: Some(f64::NAN),
            rain_24h: Some(33.0),
        }];
        let batch = SourceBatch::National(&rows);
        assert_eq!(batch.source(), Source::National);
        let tidy = unify(batch, &Normalizer::default());
        let rec = &tidy[0];
        assert_eq!(rec.canonical_station.as_str(), "Flores");
        assert_eq!(rec.rain, Some(RainValue::Interval(0.4)));
        assert_eq!(
            rec.upstream_windows,
            Some(RainWindows {
                h1: 1.2,
                h6: 0.0,
                h12: 0.0,
                h24: 33.0,
            })
        );
        assert_eq!(rec.temperature, None);
    }

    #[test]
    fn test_rain_value_serializes_with_kind() {
        // ---
        let json = serde_json::to_value(RainValue::Interval(2.0)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "interval", "mm": 2.0}));
    }

    #[test]
    fn test_empty_batch() {
        // ---
        let batch = SourceBatch::Municipal(&[]);
        assert!(batch.is_empty());
        assert!(unify(batch, &Normalizer::default()).is_empty());
    }
}
