//! Per-refresh orchestration.
//!
//! Each dashboard refresh reads the current reading set once and recomputes
//! everything from it: nothing derived is cached between calls, and the
//! builders only read their inputs, so concurrent refreshes are safe.
//!
//! The builders never fail. An empty working set yields
//! [`SnapshotStatus::NoData`]; a store failure seen by the `refresh_*`
//! helpers is logged and yields [`SnapshotStatus::Unavailable`]. Either
//! way the caller gets a well-formed snapshot with empty collections.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::alert::AlertLevel;
use crate::config::{PipelineConfig, WindowAnchor};
use crate::error::CoreError;
use crate::gazetteer::Gazetteer;
use crate::models::{MunicipalReading, NationalReading, Source};
use crate::normalize::{CanonicalStation, Normalizer};
use crate::resample::{resample_recent, ChartPoint, Field, GridPoint, RegularSeries};
use crate::store::ReadingStore;
use crate::unify::{unify, RainValue, SourceBatch, TidyRecord};
use crate::windows::{
    extreme, field_stats, rain_windows, reference_time, Extreme, Extremum, FieldStats, RainWindows,
    WindowLength,
};

/// Rows kept in the audit table.
pub const AUDIT_ROWS: usize = 15;

// ---

/// Why a snapshot is (or is not) populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ready,
    /// The source was empty or had nothing in range.
    NoData,
    /// The reading store could not be reached.
    Unavailable { reason: String },
}

impl SnapshotStatus {
    pub fn from_error(err: &CoreError) -> Self {
        match err {
            CoreError::MissingData(_) => SnapshotStatus::NoData,
            other => SnapshotStatus::Unavailable {
                reason: other.to_string(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SnapshotStatus::Ready)
    }
}

/// Window aggregates for one municipal station, over the full working set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    pub station: CanonicalStation,
    pub last_observation: Option<NaiveDateTime>,
    /// `None` when the station does not report a rain counter.
    pub rain: Option<RainWindows>,
    pub temperature: FieldStats,
    pub humidity: FieldStats,
    pub wind_speed: FieldStats,
    pub alert_level: AlertLevel,
    pub alert_label: String,
    pub color: &'static str,
}

/// Most recent tick per station, for the watchdog panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestObservation {
    pub station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    /// Minutes between the observation and the refresh time.
    pub age_minutes: i64,
    pub air_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub feels_like: Option<f64>,
}

/// Extremes across the stations in focus, within the lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extremes {
    pub max_temperature: Option<Extreme>,
    pub min_temperature: Option<Extreme>,
    pub max_feels_like: Option<Extreme>,
    pub max_wind_speed: Option<Extreme>,
    pub min_humidity: Option<Extreme>,
    /// Largest positive 24 h rainfall, stamped with the reference time.
    pub wettest: Option<Extreme>,
}

/// A map marker; only stations known to the gazetteer get one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub station: CanonicalStation,
    pub lat: f64,
    pub lon: f64,
    pub alert_level: AlertLevel,
    pub rain_24h: Option<f64>,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalSnapshot {
    pub status: SnapshotStatus,
    pub generated_at: NaiveDateTime,
    pub reference_time: Option<NaiveDateTime>,
    /// Every canonical station in the working set, for filter options.
    pub stations: Vec<CanonicalStation>,
    /// The station filter actually applied, if any.
    pub selected: Option<CanonicalStation>,
    pub series: Vec<ChartPoint>,
    pub summaries: Vec<StationSummary>,
    pub latest: Vec<LatestObservation>,
    pub extremes: Extremes,
    pub map: Vec<MapMarker>,
    pub audit: Vec<TidyRecord>,
}

impl MunicipalSnapshot {
    pub fn empty(status: SnapshotStatus, now: NaiveDateTime) -> Self {
        Self {
            status,
            generated_at: now,
            reference_time: None,
            stations: Vec::new(),
            selected: None,
            series: Vec::new(),
            summaries: Vec::new(),
            latest: Vec::new(),
            extremes: Extremes::default(),
            map: Vec::new(),
            audit: Vec::new(),
        }
    }
}

/// Latest national reading for one station with its upstream windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalStation {
    pub station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    pub age_minutes: i64,
    pub rain_mm: Option<f64>,
    pub windows: RainWindows,
    pub alert_level: AlertLevel,
    pub alert_label: String,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalSnapshot {
    pub status: SnapshotStatus,
    pub generated_at: NaiveDateTime,
    pub reference_time: Option<NaiveDateTime>,
    pub stations: Vec<CanonicalStation>,
    pub selected: Option<CanonicalStation>,
    /// One row per station, by name.
    pub latest: Vec<NationalStation>,
    /// The same rows, wettest 24 h first.
    pub ranking: Vec<NationalStation>,
    /// Tidy rows within the lookback window for the stations in focus.
    pub series: Vec<TidyRecord>,
    pub map: Vec<MapMarker>,
}

impl NationalSnapshot {
    pub fn empty(status: SnapshotStatus, now: NaiveDateTime) -> Self {
        Self {
            status,
            generated_at: now,
            reference_time: None,
            stations: Vec::new(),
            selected: None,
            latest: Vec::new(),
            ranking: Vec::new(),
            series: Vec::new(),
            map: Vec::new(),
        }
    }
}

// ---

fn anchor_time(anchor: WindowAnchor, latest: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
    match anchor {
        WindowAnchor::Latest => latest,
        WindowAnchor::WallClock => now,
    }
}

/// Resolve a raw station filter against the stations present.
///
/// Blank or unknown filters fall back to "all stations".
pub fn resolve_filter(
    normalizer: &Normalizer,
    filter: Option<&str>,
    stations: &[CanonicalStation],
) -> Option<CanonicalStation> {
    // ---
    let wanted = normalizer.canonical(filter?);
    if wanted.as_str().is_empty() {
        return None;
    }
    if stations.contains(&wanted) {
        Some(wanted)
    } else {
        warn!(station = %wanted, "unknown station filter, showing all stations");
        None
    }
}

fn missing(source: Source, now: NaiveDateTime) -> SnapshotStatus {
    let err = CoreError::MissingData(source);
    debug!(%now, "{err}");
    SnapshotStatus::from_error(&err)
}

/// Build the municipal dashboard snapshot from one read of the store.
pub fn build_municipal_snapshot(
    readings: &[MunicipalReading],
    config: &PipelineConfig,
    gazetteer: &Gazetteer,
    station_filter: Option<&str>,
    now: NaiveDateTime,
) -> MunicipalSnapshot {
    // ---
    let Some(latest_ts) = reference_time(readings.iter().map(|r| r.timestamp)) else {
        return MunicipalSnapshot::empty(missing(Source::Municipal, now), now);
    };
    let reference = anchor_time(config.anchor, latest_ts, now);
    let window_start = reference - config.lookback;

    // Only the span the outputs look at is resampled.
    let span = config.lookback.max(WindowLength::TwentyFourHours.duration());
    let all_series = resample_recent(readings, &config.normalizer, config.grid, reference, span);
    if all_series.is_empty() {
        return MunicipalSnapshot::empty(missing(Source::Municipal, now), now);
    }
    let stations: Vec<CanonicalStation> = all_series.keys().cloned().collect();
    let selected = resolve_filter(&config.normalizer, station_filter, &stations);
    let focus: Vec<&RegularSeries> = all_series
        .values()
        .filter(|s| selected.as_ref().map_or(true, |sel| *sel == s.station))
        .collect();

    debug!(
        rows = readings.len(),
        stations = stations.len(),
        %reference,
        "building municipal snapshot"
    );

    // ---
    let summaries: Vec<StationSummary> = all_series
        .values()
        .map(|s| summarize(s, reference, config))
        .collect();

    let latest = all_series
        .values()
        .filter_map(|s| latest_observation(s, now))
        .collect();

    let chart_step = config.chart_grid.step();
    let series = focus
        .iter()
        .flat_map(|s| s.coarsen(config.chart_grid))
        .filter(|p| p.timestamp + chart_step > window_start && p.timestamp <= reference)
        .collect();

    let focus_summaries: Vec<&StationSummary> = summaries
        .iter()
        .filter(|s| selected.as_ref().map_or(true, |sel| *sel == s.station))
        .collect();
    let extremes = find_extremes(&focus, &focus_summaries, window_start, reference);

    let map = summaries
        .iter()
        .filter_map(|s| {
            gazetteer.locate(&s.station).map(|c| MapMarker {
                station: s.station.clone(),
                lat: c.lat,
                lon: c.lon,
                alert_level: s.alert_level,
                rain_24h: s.rain.map(|r| r.h24),
                color: s.color,
            })
        })
        .collect();

    let audit = audit_trail(readings, &config.normalizer, selected.as_ref());

    MunicipalSnapshot {
        status: SnapshotStatus::Ready,
        generated_at: now,
        reference_time: Some(reference),
        stations,
        selected,
        series,
        summaries,
        latest,
        extremes,
        map,
        audit,
    }
}

fn summarize(series: &RegularSeries, reference: NaiveDateTime, config: &PipelineConfig) -> StationSummary {
    // ---
    let day = WindowLength::TwentyFourHours.duration();
    let rain = series
        .rain_deltas()
        .is_some()
        .then(|| rain_windows(&series.delta_series(), reference));
    let stats = |field: Field| field_stats(&series.field_series(field), reference, day);
    let alert_level = config.thresholds.classify_opt(rain.map(|r| r.h24));

    StationSummary {
        station: series.station.clone(),
        last_observation: series.last_timestamp(),
        rain,
        temperature: stats(Field::AirTemperature),
        humidity: stats(Field::RelativeHumidity),
        wind_speed: stats(Field::WindSpeed),
        alert_level,
        alert_label: config.thresholds.range_label(alert_level),
        color: alert_level.display_color(),
    }
}

fn latest_observation(series: &RegularSeries, now: NaiveDateTime) -> Option<LatestObservation> {
    let last = series.points.last()?;
    Some(LatestObservation {
        station: series.station.clone(),
        timestamp: last.timestamp,
        age_minutes: (now - last.timestamp).num_minutes(),
        air_temperature: last.air_temperature,
        relative_humidity: last.relative_humidity,
        wind_speed: last.wind_speed,
        feels_like: last.feels_like(),
    })
}

fn candidates<'a>(
    focus: &[&'a RegularSeries],
    start: NaiveDateTime,
    end: NaiveDateTime,
    get: fn(&GridPoint) -> Option<f64>,
) -> Vec<(&'a CanonicalStation, NaiveDateTime, f64)> {
    // ---
    focus
        .iter()
        .copied()
        .flat_map(|s: &'a RegularSeries| {
            s.points
                .iter()
                .filter(move |p| p.timestamp > start && p.timestamp <= end)
                .filter_map(move |p| get(p).map(move |v| (&s.station, p.timestamp, v)))
        })
        .collect()
}

fn find_extremes(
    focus: &[&RegularSeries],
    summaries: &[&StationSummary],
    start: NaiveDateTime,
    reference: NaiveDateTime,
) -> Extremes {
    // ---
    let pick = |get: fn(&GridPoint) -> Option<f64>, which: Extremum| {
        extreme(candidates(focus, start, reference, get), which)
    };
    let rain = summaries.iter().copied().filter_map(|s: &StationSummary| {
        s.rain
            .map(|r| r.h24)
            .filter(|mm| *mm > 0.0)
            .map(move |mm| (&s.station, reference, mm))
    });

    Extremes {
        max_temperature: pick(|p| p.air_temperature, Extremum::Max),
        min_temperature: pick(|p| p.air_temperature, Extremum::Min),
        max_feels_like: pick(GridPoint::feels_like, Extremum::Max),
        max_wind_speed: pick(|p| p.wind_speed, Extremum::Max),
        min_humidity: pick(|p| p.relative_humidity, Extremum::Min),
        wettest: extreme(rain, Extremum::Max),
    }
}

/// The newest raw rows, newest first.
fn audit_trail(
    readings: &[MunicipalReading],
    normalizer: &Normalizer,
    selected: Option<&CanonicalStation>,
) -> Vec<TidyRecord> {
    // ---
    let mut rows: Vec<TidyRecord> = unify(SourceBatch::Municipal(readings), normalizer)
        .into_iter()
        .filter(|r| selected.map_or(true, |sel| *sel == r.canonical_station))
        .collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.truncate(AUDIT_ROWS);
    rows
}

// ---

/// Build the national rain-gauge snapshot.
///
/// Rolling sums come from upstream and are not recomputed here.
pub fn build_national_snapshot(
    readings: &[NationalReading],
    config: &PipelineConfig,
    gazetteer: &Gazetteer,
    station_filter: Option<&str>,
    now: NaiveDateTime,
) -> NationalSnapshot {
    // ---
    let Some(latest_ts) = reference_time(readings.iter().map(|r| r.timestamp)) else {
        return NationalSnapshot::empty(missing(Source::National, now), now);
    };
    let reference = anchor_time(config.anchor, latest_ts, now);
    let window_start = reference - config.lookback;

    let tidy = unify(SourceBatch::National(readings), &config.normalizer);

    let mut newest: BTreeMap<CanonicalStation, &TidyRecord> = BTreeMap::new();
    for rec in &tidy {
        let replace = newest
            .get(&rec.canonical_station)
            .map_or(true, |seen| rec.timestamp >= seen.timestamp);
        if replace {
            newest.insert(rec.canonical_station.clone(), rec);
        }
    }

    let stations: Vec<CanonicalStation> = newest.keys().cloned().collect();
    let selected = resolve_filter(&config.normalizer, station_filter, &stations);

    debug!(
        rows = readings.len(),
        stations = stations.len(),
        %reference,
        "building national snapshot"
    );

    let latest: Vec<NationalStation> = newest
        .values()
        .map(|rec| {
            let windows = rec.upstream_windows.unwrap_or_default();
            let alert_level = config.thresholds.classify(windows.h24);
            NationalStation {
                station: rec.canonical_station.clone(),
                timestamp: rec.timestamp,
                age_minutes: (now - rec.timestamp).num_minutes(),
                rain_mm: rec.rain.map(|r| match r {
                    RainValue::Interval(mm) | RainValue::Cumulative(mm) => mm,
                }),
                windows,
                alert_level,
                alert_label: config.thresholds.range_label(alert_level),
                color: alert_level.display_color(),
            }
        })
        .collect();

    let mut ranking = latest.clone();
    ranking.sort_by(|a, b| {
        b.windows
            .h24
            .total_cmp(&a.windows.h24)
            .then_with(|| a.station.cmp(&b.station))
    });

    let map = latest
        .iter()
        .filter_map(|s| {
            gazetteer.locate(&s.station).map(|c| MapMarker {
                station: s.station.clone(),
                lat: c.lat,
                lon: c.lon,
                alert_level: s.alert_level,
                rain_24h: Some(s.windows.h24),
                color: s.color,
            })
        })
        .collect();

    let mut series: Vec<TidyRecord> = tidy
        .iter()
        .filter(|r| selected.as_ref().map_or(true, |sel| *sel == r.canonical_station))
        .filter(|r| r.timestamp > window_start && r.timestamp <= reference)
        .cloned()
        .collect();
    series.sort_by(|a, b| {
        a.canonical_station
            .cmp(&b.canonical_station)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    NationalSnapshot {
        status: SnapshotStatus::Ready,
        generated_at: now,
        reference_time: Some(reference),
        stations,
        selected,
        latest,
        ranking,
        series,
        map,
    }
}

// ---

/// Fetch municipal readings and build a snapshot, absorbing store failures.
pub async fn refresh_municipal<S: ReadingStore>(
    store: &S,
    config: &PipelineConfig,
    gazetteer: &Gazetteer,
    station_filter: Option<&str>,
    now: NaiveDateTime,
) -> MunicipalSnapshot {
    // ---
    match store.fetch_municipal().await {
        Ok(readings) => build_municipal_snapshot(&readings, config, gazetteer, station_filter, now),
        Err(e) => {
            let err = CoreError::from(e);
            error!("municipal refresh failed: {err}");
            MunicipalSnapshot::empty(SnapshotStatus::from_error(&err), now)
        }
    }
}

/// Fetch national readings and build a snapshot, absorbing store failures.
pub async fn refresh_national<S: ReadingStore>(
    store: &S,
    config: &PipelineConfig,
    gazetteer: &Gazetteer,
    station_filter: Option<&str>,
    now: NaiveDateTime,
) -> NationalSnapshot {
    // ---
    match store.fetch_national().await {
        Ok(readings) => build_national_snapshot(&readings, config, gazetteer, station_filter, now),
        Err(e) => {
            let err = CoreError::from(e);
            error!("national refresh failed: {err}");
            NationalSnapshot::empty(SnapshotStatus::from_error(&err), now)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::gazetteer::Coordinates;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn reading(name: &str, ts: NaiveDateTime, temp: f64, rain: f64) -> MunicipalReading {
        MunicipalReading {
            station_name: name.to_string(),
            timestamp: ts,
            air_temperature: Some(temp),
            relative_humidity: Some(70.0),
            pressure: None,
            wind_speed: Some(1.0),
            wind_direction: None,
            rain_cumulative: Some(rain),
        }
    }

    fn gazetteer() -> Gazetteer {
        Gazetteer::from_entries(vec![(
            "EST_MINDU".to_string(),
            Coordinates {
                lat: -3.078,
                lon: -60.007,
            },
        )])
    }

    #[test]
    fn test_empty_input_is_no_data() {
        // ---
        let snap = build_municipal_snapshot(&[], &PipelineConfig::default(), &gazetteer(), None, t(12, 0));
        assert_eq!(snap.status, SnapshotStatus::NoData);
        assert!(snap.summaries.is_empty() && snap.map.is_empty() && snap.audit.is_empty());
        assert_eq!(snap.reference_time, None);

        let nat = build_national_snapshot(&[], &PipelineConfig::default(), &gazetteer(), None, t(12, 0));
        assert_eq!(nat.status, SnapshotStatus::NoData);
    }

    #[test]
    fn test_map_only_has_gazetteer_stations() {
        // ---
        let rows = vec![
            reading("EST_MINDU", t(11, 0), 28.0, 0.0),
            reading("EST_MINDU", t(12, 0), 30.0, 12.0),
            reading("EST_NOWHERE", t(12, 0), 29.0, 0.0),
        ];
        let snap = build_municipal_snapshot(&rows, &PipelineConfig::default(), &gazetteer(), None, t(12, 5));
        assert_eq!(snap.summaries.len(), 2);
        assert_eq!(snap.map.len(), 1);
        assert_eq!(snap.map[0].station.as_str(), "EST_MINDU");
        assert_eq!(snap.map[0].rain_24h, Some(12.0));
        assert_eq!(snap.map[0].alert_level, AlertLevel::Observacao);
    }

    #[test]
    fn test_unknown_filter_falls_back_to_all() {
        // ---
        let rows = vec![
            reading("A", t(12, 0), 28.0, 0.0),
            reading("B", t(12, 0), 31.0, 0.0),
        ];
        let snap = build_municipal_snapshot(
            &rows,
            &PipelineConfig::default(),
            &gazetteer(),
            Some("Z"),
            t(12, 0),
        );
        assert_eq!(snap.selected, None);
        assert_eq!(snap.audit.len(), 2);

        let only_a = build_municipal_snapshot(
            &rows,
            &PipelineConfig::default(),
            &gazetteer(),
            Some("DEFESA CIVIL - A"),
            t(12, 0),
        );
        assert_eq!(only_a.selected.as_ref().map(|s| s.as_str()), Some("A"));
        assert_eq!(only_a.audit.len(), 1);
        assert_eq!(only_a.summaries.len(), 2);
        assert_eq!(only_a.extremes.max_temperature.unwrap().value, 28.0);
    }

    #[test]
    fn test_wallclock_anchor_uses_now() {
        // ---
        let rows = vec![
            reading("A", t(1, 0), 28.0, 0.0),
            reading("A", t(2, 0), 28.0, 5.0),
        ];
        let config = PipelineConfig {
            anchor: WindowAnchor::WallClock,
            ..PipelineConfig::default()
        };
        let snap = build_municipal_snapshot(&rows, &config, &gazetteer(), None, t(4, 0));
        assert_eq!(snap.reference_time, Some(t(4, 0)));
        let rain = snap.summaries[0].rain.unwrap();
        assert_eq!(rain.h1, 0.0);
        assert_eq!(rain.h6, 5.0);
        assert_eq!(snap.latest[0].age_minutes, 120);
    }

    #[test]
    fn test_counter_missing_in_first_row_is_not_rain() {
        // ---
        let rows = vec![
            MunicipalReading {
                rain_cumulative: None,
                ..reading("EST_MINDU", t(10, 0), 28.0, 0.0)
            },
            reading("EST_MINDU", t(10, 1), 28.0, 500.0),
            reading("EST_MINDU", t(10, 2), 28.0, 500.0),
        ];
        let snap = build_municipal_snapshot(&rows, &PipelineConfig::default(), &gazetteer(), None, t(10, 5));
        let summary = &snap.summaries[0];
        assert_eq!(summary.rain.map(|r| r.h24), Some(0.0));
        assert_eq!(summary.alert_level, AlertLevel::Normal);
        assert_eq!(snap.extremes.wettest, None);
    }

    #[test]
    fn test_old_history_only_supplies_a_counter_baseline() {
        // ---
        let year_ago = t(12, 0) - chrono::Duration::days(365);
        let rows = vec![
            reading("EST_MINDU", year_ago, 20.0, 40.0),
            reading("EST_MINDU", t(11, 0), 28.0, 42.0),
            reading("EST_MINDU", t(12, 0), 30.0, 45.0),
        ];
        let snap = build_municipal_snapshot(&rows, &PipelineConfig::default(), &gazetteer(), None, t(12, 0));
        assert_eq!(snap.summaries[0].rain.map(|r| r.h24), Some(5.0));
        assert_eq!(snap.summaries[0].temperature.min, Some(28.0));
        // 11:00 through 12:00 in 10 minute chart buckets
        assert_eq!(snap.series.len(), 7);
        assert_eq!(snap.series[0].timestamp, t(11, 0));
    }

    #[test]
    fn test_status_from_error() {
        // ---
        assert_eq!(
            SnapshotStatus::from_error(&CoreError::MissingData(Source::National)),
            SnapshotStatus::NoData
        );
        assert!(matches!(
            SnapshotStatus::from_error(&CoreError::UpstreamUnavailable("down".into())),
            SnapshotStatus::Unavailable { .. }
        ));
        let json = serde_json::to_value(SnapshotStatus::NoData).unwrap();
        assert_eq!(json, serde_json::json!({"state": "no_data"}));
    }
}
