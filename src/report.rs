//! Historical reports: pick stations, a date range, a variable and a
//! granularity; get bucketed rows, a per-station summary and a CSV export.
//!
//! Rain is summed per bucket (municipal rain comes from the reconstructed
//! counter deltas, national rain from the per-reading interval amounts),
//! temperature and humidity are averaged, wind speed takes the maximum.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::str::FromStr;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use csv::Writer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::CoreError;
use crate::models::{MunicipalReading, NationalReading, Source};
use crate::normalize::{CanonicalStation, Normalizer};
use crate::pipeline::SnapshotStatus;
use crate::resample::{resample_all, Grid};
use crate::store::ReadingStore;
use crate::windows::{describe, Descriptive};

// ---

/// A report request that could not be understood.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("unknown source {0:?}")]
    UnknownSource(String),

    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("unknown granularity {0:?}")]
    UnknownGranularity(String),

    #[error("end date {end} is before start date {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Rain,
    Temperature,
    Humidity,
    WindSpeed,
}

impl Variable {
    /// Column header used in exports.
    pub fn column_name(self) -> &'static str {
        match self {
            Variable::Rain => "rain_mm",
            Variable::Temperature => "air_temperature",
            Variable::Humidity => "relative_humidity",
            Variable::WindSpeed => "wind_speed",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Variable {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rain" | "rain_mm" | "chuva_mm" => Ok(Variable::Rain),
            "temperature" | "air_temperature" | "temp_ar" => Ok(Variable::Temperature),
            "humidity" | "relative_humidity" | "umidade" => Ok(Variable::Humidity),
            "wind_speed" | "wind" | "vento_vel" => Ok(Variable::WindSpeed),
            other => Err(RequestError::UnknownVariable(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
}

impl FromStr for Granularity {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "h" | "hour" => Ok(Granularity::Hourly),
            "daily" | "d" | "day" => Ok(Granularity::Daily),
            other => Err(RequestError::UnknownGranularity(other.to_string())),
        }
    }
}

impl Granularity {
    /// Start of the bucket containing `ts`.
    pub fn bucket(self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hourly => Grid::minutes(60).map_or(ts, |g| g.floor(ts)),
            Granularity::Daily => ts.date().and_time(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub source: Source,
    /// Raw or canonical names; normalized before matching.
    pub stations: Vec<String>,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub variable: Variable,
    pub granularity: Granularity,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.end < self.start {
            return Err(RequestError::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Half-open timestamp range covering every day of the request.
    pub fn time_range(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start.and_time(NaiveTime::MIN);
        let end = self
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN);
        (start, end)
    }

    /// Suggested export file name, e.g. `dados_municipal_2025-03-01_2025-03-07.csv`.
    pub fn file_name(&self) -> String {
        format!("dados_{}_{}_{}.csv", self.source, self.start, self.end)
    }

    fn selected(&self, normalizer: &Normalizer) -> BTreeSet<CanonicalStation> {
        self.stations
            .iter()
            .map(|s| normalizer.canonical(s))
            .filter(|s| !s.as_str().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStats {
    pub station: CanonicalStation,
    #[serde(flatten)]
    pub stats: Descriptive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: SnapshotStatus,
    pub request: ReportRequest,
    /// Ordered by station, then bucket.
    pub rows: Vec<ReportRow>,
    pub summary: Vec<StationStats>,
}

impl Report {
    pub fn empty(status: SnapshotStatus, request: ReportRequest) -> Self {
        Self {
            status,
            request,
            rows: Vec::new(),
            summary: Vec::new(),
        }
    }
}

// ---

#[derive(Debug, Clone, Copy)]
enum Reducer {
    Sum,
    Mean,
    Max,
}

impl Reducer {
    fn for_variable(variable: Variable) -> Self {
        match variable {
            Variable::Rain => Reducer::Sum,
            Variable::Temperature | Variable::Humidity => Reducer::Mean,
            Variable::WindSpeed => Reducer::Max,
        }
    }

    fn apply(self, d: &Descriptive) -> Option<f64> {
        match self {
            Reducer::Sum => (d.count > 0).then_some(d.sum),
            Reducer::Mean => d.mean,
            Reducer::Max => d.max,
        }
    }
}

type Samples = BTreeMap<(CanonicalStation, NaiveDateTime), Vec<f64>>;

fn finish(request: ReportRequest, samples: Samples) -> Report {
    // ---
    let reducer = Reducer::for_variable(request.variable);
    let rows: Vec<ReportRow> = samples
        .into_iter()
        .filter_map(|((station, timestamp), values)| {
            reducer.apply(&describe(values)).map(|value| ReportRow {
                station,
                timestamp,
                value,
            })
        })
        .collect();

    let mut per_station: BTreeMap<&CanonicalStation, Vec<f64>> = BTreeMap::new();
    for row in &rows {
        per_station.entry(&row.station).or_default().push(row.value);
    }
    let summary = per_station
        .into_iter()
        .map(|(station, values)| StationStats {
            station: station.clone(),
            stats: describe(values),
        })
        .collect();

    let status = if rows.is_empty() {
        SnapshotStatus::NoData
    } else {
        SnapshotStatus::Ready
    };
    Report {
        status,
        request,
        rows,
        summary,
    }
}

/// Build a report from municipal readings.
pub fn build_municipal_report(
    readings: &[MunicipalReading],
    request: ReportRequest,
    config: &PipelineConfig,
) -> Report {
    // ---
    let selected = request.selected(&config.normalizer);
    if selected.is_empty() {
        return Report::empty(SnapshotStatus::NoData, request);
    }
    let (start, end) = request.time_range();
    let in_range = |ts: NaiveDateTime| ts >= start && ts < end;
    let granularity = request.granularity;
    let mut samples = Samples::new();

    match request.variable {
        Variable::Rain => {
            for (station, series) in resample_all(readings, &config.normalizer, config.grid) {
                if !selected.contains(&station) {
                    continue;
                }
                for (ts, delta) in series.delta_series() {
                    if in_range(ts) {
                        samples
                            .entry((station.clone(), granularity.bucket(ts)))
                            .or_default()
                            .push(delta);
                    }
                }
            }
        }
        variable => {
            for r in readings.iter().filter(|r| in_range(r.timestamp)) {
                let station = config.normalizer.canonical(&r.station_name);
                if !selected.contains(&station) {
                    continue;
                }
                let value = match variable {
                    Variable::Temperature => r.air_temperature,
                    Variable::Humidity => r.relative_humidity,
                    _ => r.wind_speed,
                };
                if let Some(v) = value {
                    samples
                        .entry((station, granularity.bucket(r.timestamp)))
                        .or_default()
                        .push(v);
                }
            }
        }
    }
    finish(request, samples)
}

/// Build a report from national readings. Only rain is reported there.
pub fn build_national_report(
    readings: &[NationalReading],
    request: ReportRequest,
    config: &PipelineConfig,
) -> Report {
    // ---
    let selected = request.selected(&config.normalizer);
    if selected.is_empty() || request.variable != Variable::Rain {
        return Report::empty(SnapshotStatus::NoData, request);
    }
    let (start, end) = request.time_range();
    let mut samples = Samples::new();

    for r in readings.iter().filter(|r| r.timestamp >= start && r.timestamp < end) {
        let station = config.normalizer.canonical(&r.station_name);
        if !selected.contains(&station) {
            continue;
        }
        if let Some(mm) = r.rain_mm {
            samples
                .entry((station, request.granularity.bucket(r.timestamp)))
                .or_default()
                .push(mm);
        }
    }
    finish(request, samples)
}

/// Fetch the requested range and build the report, absorbing store failures.
pub async fn run_report<S: ReadingStore>(
    store: &S,
    request: ReportRequest,
    config: &PipelineConfig,
) -> Report {
    // ---
    let (start, end) = request.time_range();
    let fetched = match request.source {
        Source::Municipal => store
            .fetch_municipal_range(start, end)
            .await
            .map(|rows| build_municipal_report(&rows, request.clone(), config)),
        Source::National => store
            .fetch_national_range(start, end)
            .await
            .map(|rows| build_national_report(&rows, request.clone(), config)),
    };
    match fetched {
        Ok(report) => {
            info!(rows = report.rows.len(), source = %request.source, "report built");
            report
        }
        Err(e) => {
            let err = CoreError::from(e);
            error!("report failed: {err}");
            Report::empty(SnapshotStatus::from_error(&err), request)
        }
    }
}

/// Render rows as CSV with a `station,timestamp,<variable>` header.
pub fn to_csv(report: &Report) -> Result<String, csv::Error> {
    // ---
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record(["station", "timestamp", report.request.variable.column_name()])?;
    for row in &report.rows {
        let timestamp = row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let value = row.value.to_string();
        writer.write_record([row.station.as_str(), timestamp.as_str(), value.as_str()])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}
