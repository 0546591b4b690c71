//! Resampling of irregular station readings onto a regular time grid.
//!
//! Per canonical station: duplicates at the same timestamp are collapsed
//! (last arrival wins), readings are bucketed onto ticks aligned to
//! multiples of the grid step, continuous fields are averaged and their
//! interior gaps linearly interpolated, and the cumulative rain counter is
//! max-held and forward filled.
//!
//! Rainfall deltas start at the first tick where the counter was actually
//! observed. Leading ticks are filled for display only and never act as a
//! reference, so a counter first seen mid-series does not turn its whole
//! history into rain.
//!
//! The analytical grid stays fine (1 minute by default). Chart payloads use
//! [`RegularSeries::coarsen`], which never feeds back into aggregation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::Serialize;

use crate::heat_index::feels_like_opt;
use crate::models::MunicipalReading;
use crate::normalize::{CanonicalStation, Normalizer};
use crate::rainfall::to_deltas;

// ---

/// A validated, strictly positive grid step with whole-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid(Duration);

impl Grid {
    pub fn new(step: Duration) -> Option<Self> {
        (step.num_seconds() >= 1).then(|| Grid(Duration::seconds(step.num_seconds())))
    }

    pub fn minutes(n: i64) -> Option<Self> {
        Self::new(Duration::minutes(n))
    }

    pub fn step(&self) -> Duration {
        self.0
    }

    /// Start of the tick containing `ts`.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        // ---
        let step = self.0.num_seconds();
        let secs = ts.and_utc().timestamp();
        let floored = secs.div_euclid(step) * step;
        DateTime::from_timestamp(floored, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or(ts)
    }
}

impl Default for Grid {
    fn default() -> Self {
        Grid(Duration::minutes(1))
    }
}

/// Continuous (interpolated) reading fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AirTemperature,
    RelativeHumidity,
    Pressure,
    WindSpeed,
    WindDirection,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::AirTemperature,
        Field::RelativeHumidity,
        Field::Pressure,
        Field::WindSpeed,
        Field::WindDirection,
    ];

    fn of_reading(self, r: &MunicipalReading) -> Option<f64> {
        match self {
            Field::AirTemperature => r.air_temperature,
            Field::RelativeHumidity => r.relative_humidity,
            Field::Pressure => r.pressure,
            Field::WindSpeed => r.wind_speed,
            Field::WindDirection => r.wind_direction,
        }
    }

    pub fn of_point(self, p: &GridPoint) -> Option<f64> {
        match self {
            Field::AirTemperature => p.air_temperature,
            Field::RelativeHumidity => p.relative_humidity,
            Field::Pressure => p.pressure,
            Field::WindSpeed => p.wind_speed,
            Field::WindDirection => p.wind_direction,
        }
    }

    fn slot(self, p: &mut GridPoint) -> &mut Option<f64> {
        match self {
            Field::AirTemperature => &mut p.air_temperature,
            Field::RelativeHumidity => &mut p.relative_humidity,
            Field::Pressure => &mut p.pressure,
            Field::WindSpeed => &mut p.wind_speed,
            Field::WindDirection => &mut p.wind_direction,
        }
    }
}

/// One tick of a [`RegularSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPoint {
    pub timestamp: NaiveDateTime,
    pub air_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    /// Forward-filled counter; `None` only when the station never reports it.
    pub rain_cumulative: Option<f64>,
}

impl GridPoint {
    fn empty(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            air_temperature: None,
            relative_humidity: None,
            pressure: None,
            wind_speed: None,
            wind_direction: None,
            rain_cumulative: None,
        }
    }

    pub fn feels_like(&self) -> Option<f64> {
        feels_like_opt(self.air_temperature, self.relative_humidity)
    }
}

/// Exactly one point per grid tick between the first and last reading.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularSeries {
    pub station: CanonicalStation,
    pub grid: Grid,
    pub points: Vec<GridPoint>,
    /// Index of the first tick with an observed counter value.
    pub counter_start: usize,
    /// Last counter value seen before the series starts, if any.
    pub counter_baseline: Option<f64>,
}

/// A coarsened point for chart payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    pub air_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub feels_like: Option<f64>,
    /// Highest counter value in the bucket.
    pub rain_cumulative: Option<f64>,
    /// Rain that fell during this chart bucket, in mm.
    pub rain_mm: Option<f64>,
}

// ---

/// Resample every station found in `readings`.
pub fn resample_all(
    readings: &[MunicipalReading],
    normalizer: &Normalizer,
    grid: Grid,
) -> BTreeMap<CanonicalStation, RegularSeries> {
    // ---
    let mut partitions: BTreeMap<CanonicalStation, Vec<&MunicipalReading>> = BTreeMap::new();
    for reading in readings {
        partitions
            .entry(normalizer.canonical(&reading.station_name))
            .or_default()
            .push(reading);
    }

    partitions
        .into_iter()
        .filter_map(|(station, rows)| {
            resample_partition(station.clone(), &rows, grid, None).map(|series| (station, series))
        })
        .collect()
}

/// Resample only what trailing windows of `span` ending at `reference` can see.
///
/// Readings in `(reference - span - step, reference]` are resampled. For
/// each station the newest counter value at or before that cutoff becomes
/// the series' counter baseline, so the first tick in range still gets a
/// delta. Stations with nothing in range are left out.
pub fn resample_recent(
    readings: &[MunicipalReading],
    normalizer: &Normalizer,
    grid: Grid,
    reference: NaiveDateTime,
    span: Duration,
) -> BTreeMap<CanonicalStation, RegularSeries> {
    // ---
    let cutoff = reference - span - grid.step();
    let mut recent: BTreeMap<CanonicalStation, Vec<&MunicipalReading>> = BTreeMap::new();
    let mut prior: HashMap<CanonicalStation, (NaiveDateTime, f64)> = HashMap::new();

    for reading in readings.iter().filter(|r| r.timestamp <= reference) {
        let station = normalizer.canonical(&reading.station_name);
        if reading.timestamp > cutoff {
            recent.entry(station).or_default().push(reading);
        } else if let Some(value) = reading.rain_cumulative {
            let newer = prior
                .get(&station)
                .map_or(true, |(ts, _)| reading.timestamp >= *ts);
            if newer {
                prior.insert(station, (reading.timestamp, value));
            }
        }
    }

    recent
        .into_iter()
        .filter_map(|(station, rows)| {
            let baseline = prior.get(&station).map(|(_, v)| *v);
            resample_partition(station.clone(), &rows, grid, baseline)
                .map(|series| (station, series))
        })
        .collect()
}

/// Resample one station. Returns `None` when it has no readings.
pub fn resample(
    readings: &[MunicipalReading],
    station: &CanonicalStation,
    normalizer: &Normalizer,
    grid: Grid,
) -> Option<RegularSeries> {
    // ---
    let rows: Vec<&MunicipalReading> = readings
        .iter()
        .filter(|r| normalizer.canonical(&r.station_name) == *station)
        .collect();
    resample_partition(station.clone(), &rows, grid, None)
}

fn resample_partition(
    station: CanonicalStation,
    rows: &[&MunicipalReading],
    grid: Grid,
    baseline: Option<f64>,
) -> Option<RegularSeries> {
    // ---
    // Later arrivals overwrite earlier ones at the same exact timestamp.
    let mut deduped: BTreeMap<NaiveDateTime, &MunicipalReading> = BTreeMap::new();
    for row in rows {
        deduped.insert(row.timestamp, *row);
    }

    let first = grid.floor(*deduped.keys().next()?);
    let last = grid.floor(*deduped.keys().next_back()?);
    let step = grid.step().num_seconds();
    let ticks = ((last - first).num_seconds() / step) as usize + 1;

    let mut points: Vec<GridPoint> = (0..ticks)
        .map(|i| GridPoint::empty(first + Duration::seconds(step * i as i64)))
        .collect();

    let mut sums: HashMap<(usize, Field), (f64, u32)> = HashMap::new();
    let mut rain_max: Vec<Option<f64>> = vec![None; ticks];

    for (ts, reading) in &deduped {
        let idx = ((grid.floor(*ts) - first).num_seconds() / step) as usize;
        for field in Field::ALL {
            if let Some(v) = field.of_reading(reading) {
                let acc = sums.entry((idx, field)).or_insert((0.0, 0));
                acc.0 += v;
                acc.1 += 1;
            }
        }
        if let Some(v) = reading.rain_cumulative {
            rain_max[idx] = Some(rain_max[idx].map_or(v, |m: f64| m.max(v)));
        }
    }

    for ((idx, field), (sum, count)) in sums {
        *field.slot(&mut points[idx]) = Some(sum / f64::from(count));
    }

    for field in Field::ALL {
        let mut column: Vec<Option<f64>> = points.iter().map(|p| field.of_point(p)).collect();
        interpolate_interior(&mut column);
        for (point, value) in points.iter_mut().zip(column) {
            *field.slot(point) = value;
        }
    }

    let counter_start = rain_max
        .iter()
        .position(Option::is_some)
        .unwrap_or(ticks);
    for (point, value) in points
        .iter_mut()
        .zip(forward_fill_counter(&rain_max, baseline))
    {
        point.rain_cumulative = value;
    }

    Some(RegularSeries {
        station,
        grid,
        points,
        counter_start,
        counter_baseline: baseline,
    })
}

/// Linearly fill `None` runs bounded on both sides by known values.
///
/// Leading and trailing gaps are left alone; with fewer than two known
/// values nothing changes.
pub fn interpolate_interior(values: &mut [Option<f64>]) {
    // ---
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    for pair in known.windows(2) {
        let (i, j) = (pair[0], pair[1]);
        if j - i < 2 {
            continue;
        }
        let (a, b) = match (values[i], values[j]) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        let span = (j - i) as f64;
        for k in (i + 1)..j {
            let alpha = (k - i) as f64 / span;
            values[k] = Some(a + (b - a) * alpha);
        }
    }
}

/// Forward fill a max-held counter, starting from `baseline` (or zero)
/// before its first observation.
///
/// A counter that is never observed and has no baseline stays `None`.
fn forward_fill_counter(values: &[Option<f64>], baseline: Option<f64>) -> Vec<Option<f64>> {
    // ---
    if baseline.is_none() && values.iter().all(Option::is_none) {
        return vec![None; values.len()];
    }
    let mut last = baseline.unwrap_or(0.0);
    values
        .iter()
        .map(|v| {
            if let Some(v) = v {
                last = *v;
            }
            Some(last)
        })
        .collect()
}

impl RegularSeries {
    // ---
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Per-tick rainfall reconstructed from the counter.
    ///
    /// Ticks before `counter_start` are zero. The first observed tick is
    /// measured against the baseline when there is one, otherwise it is zero.
    pub fn rain_deltas(&self) -> Option<Vec<f64>> {
        // ---
        let counter: Vec<f64> = self
            .points
            .iter()
            .map(|p| p.rain_cumulative)
            .collect::<Option<_>>()?;
        let start = self.counter_start.min(counter.len());
        let observed = &counter[start..];

        let mut deltas = vec![0.0; start];
        match self.counter_baseline {
            Some(base) => {
                let mut anchored = Vec::with_capacity(observed.len() + 1);
                anchored.push(base);
                anchored.extend_from_slice(observed);
                deltas.extend(to_deltas(&anchored).into_iter().skip(1));
            }
            None => deltas.extend(to_deltas(observed)),
        }
        Some(deltas)
    }

    /// `(timestamp, value)` pairs for a continuous field.
    pub fn field_series(&self, field: Field) -> Vec<(NaiveDateTime, Option<f64>)> {
        self.points
            .iter()
            .map(|p| (p.timestamp, field.of_point(p)))
            .collect()
    }

    /// `(timestamp, delta)` pairs, empty when the station has no counter.
    pub fn delta_series(&self) -> Vec<(NaiveDateTime, f64)> {
        // ---
        match self.rain_deltas() {
            Some(deltas) => self
                .points
                .iter()
                .zip(deltas)
                .map(|(p, d)| (p.timestamp, d))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Downsample for charting: mean of continuous fields and feels-like,
    /// max of the counter, sum of rainfall deltas, per `chart_grid` bucket.
    pub fn coarsen(&self, chart_grid: Grid) -> Vec<ChartPoint> {
        // ---
        let deltas = self.rain_deltas();
        let mut buckets: BTreeMap<NaiveDateTime, Vec<usize>> = BTreeMap::new();
        for (i, p) in self.points.iter().enumerate() {
            buckets.entry(chart_grid.floor(p.timestamp)).or_default().push(i);
        }

        buckets
            .into_iter()
            .map(|(timestamp, idxs)| {
                let mean_of = |get: fn(&GridPoint) -> Option<f64>| {
                    mean(idxs.iter().filter_map(|&i| get(&self.points[i])))
                };
                ChartPoint {
                    station: self.station.clone(),
                    timestamp,
                    air_temperature: mean_of(|p| p.air_temperature),
                    relative_humidity: mean_of(|p| p.relative_humidity),
                    pressure: mean_of(|p| p.pressure),
                    wind_speed: mean_of(|p| p.wind_speed),
                    wind_direction: mean_of(|p| p.wind_direction),
                    feels_like: mean_of(GridPoint::feels_like),
                    rain_cumulative: idxs
                        .iter()
                        .filter_map(|&i| self.points[i].rain_cumulative)
                        .reduce(f64::max),
                    rain_mm: deltas
                        .as_ref()
                        .map(|d| idxs.iter().map(|&i| d[i]).sum()),
                }
            })
            .collect()
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / f64::from(count))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reading(name: &str, ts: NaiveDateTime) -> MunicipalReading {
        MunicipalReading {
            station_name: name.to_string(),
            timestamp: ts,
            air_temperature: None,
            relative_humidity: None,
            pressure: None,
            wind_speed: None,
            wind_direction: None,
            rain_cumulative: None,
        }
    }

    fn with_temp(name: &str, ts: NaiveDateTime, temp: f64) -> MunicipalReading {
        MunicipalReading {
            air_temperature: Some(temp),
            ..reading(name, ts)
        }
    }

    fn with_rain(name: &str, ts: NaiveDateTime, rain: f64) -> MunicipalReading {
        MunicipalReading {
            rain_cumulative: Some(rain),
            ..reading(name, ts)
        }
    }

    fn station(name: &str) -> CanonicalStation {
        Normalizer::default().canonical(name)
    }

    #[test]
    fn test_grid_floor_aligns_to_minute() {
        // ---
        let grid = Grid::default();
        assert_eq!(grid.floor(t(10, 3, 59)), t(10, 3, 0));
        assert_eq!(grid.floor(t(10, 3, 0)), t(10, 3, 0));
        let ten = Grid::minutes(10).unwrap();
        assert_eq!(ten.floor(t(10, 19, 30)), t(10, 10, 0));
    }

    #[test]
    fn test_grid_rejects_sub_second_steps() {
        // ---
        assert!(Grid::new(Duration::milliseconds(500)).is_none());
        assert!(Grid::minutes(0).is_none());
        assert!(Grid::minutes(-5).is_none());
    }

    #[test]
    fn test_single_reading_gives_one_tick() {
        // ---
        let rows = vec![MunicipalReading {
            air_temperature: Some(30.0),
            ..reading("EST_MINDU", t(12, 0, 0))
        }];
        let series = resample(&rows, &station("EST_MINDU"), &Normalizer::default(), Grid::default())
            .expect("one reading is enough");
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].timestamp, t(12, 0, 0));
        assert_eq!(series.points[0].air_temperature, Some(30.0));
        assert_eq!(series.points[0].relative_humidity, None);
    }

    #[test]
    fn test_grid_is_complete_and_gaps_interpolated() {
        // ---
        let rows = vec![
            with_temp("A", t(12, 0, 0), 20.0),
            with_temp("A", t(12, 4, 0), 24.0),
        ];
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        let temps: Vec<_> = series.points.iter().map(|p| p.air_temperature).collect();
        assert_eq!(
            temps,
            vec![Some(20.0), Some(21.0), Some(22.0), Some(23.0), Some(24.0)]
        );
        for pair in series.points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(1));
        }
    }

    #[test]
    fn test_bucket_mean_for_continuous_and_max_for_counter() {
        // ---
        let rows = vec![
            MunicipalReading {
                air_temperature: Some(20.0),
                rain_cumulative: Some(3.0),
                ..reading("A", t(12, 0, 10))
            },
            MunicipalReading {
                air_temperature: Some(22.0),
                rain_cumulative: Some(5.0),
                ..reading("A", t(12, 0, 40))
            },
            MunicipalReading {
                air_temperature: Some(21.0),
                rain_cumulative: Some(4.0),
                ..reading("A", t(12, 0, 50))
            },
        ];
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].air_temperature, Some(21.0));
        assert_eq!(series.points[0].rain_cumulative, Some(5.0));
    }

    #[test]
    fn test_duplicate_timestamp_keeps_last_arrival() {
        // ---
        let rows = vec![
            with_temp("A", t(12, 0, 0), 25.0),
            with_temp("A", t(12, 0, 0), 27.0),
        ];
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].air_temperature, Some(27.0));
    }

    #[test]
    fn test_counter_forward_filled_and_zero_before_first() {
        // ---
        let rows = vec![
            with_temp("A", t(12, 0, 0), 25.0),
            with_rain("A", t(12, 2, 0), 4.0),
            with_temp("A", t(12, 4, 0), 25.0),
        ];
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        let rain: Vec<_> = series.points.iter().map(|p| p.rain_cumulative).collect();
        assert_eq!(
            rain,
            vec![Some(0.0), Some(0.0), Some(4.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn test_counter_first_seen_mid_series_is_not_rain() {
        // ---
        let rows = vec![
            with_temp("EST_MINDU", t(10, 0, 0), 28.0),
            with_rain("EST_MINDU", t(10, 1, 0), 500.0),
            with_rain("EST_MINDU", t(10, 2, 0), 500.0),
            with_rain("EST_MINDU", t(10, 3, 0), 501.5),
        ];
        let series =
            resample(&rows, &station("EST_MINDU"), &Normalizer::default(), Grid::default()).unwrap();
        assert_eq!(series.counter_start, 1);
        assert_eq!(series.points[0].rain_cumulative, Some(0.0));
        assert_eq!(series.rain_deltas(), Some(vec![0.0, 0.0, 0.0, 1.5]));
    }

    #[test]
    fn test_recent_window_uses_prior_counter_as_baseline() {
        // ---
        let long_ago = t(0, 0, 0) - Duration::days(365);
        let rows = vec![
            with_rain("A", long_ago, 40.0),
            with_rain("A", t(11, 0, 0), 42.0),
            with_rain("A", t(12, 0, 0), 45.0),
        ];
        let all = resample_recent(
            &rows,
            &Normalizer::default(),
            Grid::default(),
            t(12, 0, 0),
            Duration::hours(24),
        );
        let a = &all[&station("A")];
        assert_eq!(a.points.len(), 61);
        assert_eq!(a.counter_baseline, Some(40.0));
        let deltas = a.rain_deltas().unwrap();
        assert_eq!(deltas[0], 2.0);
        assert_eq!(deltas.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn test_recent_window_drops_stale_stations_and_future_rows() {
        // ---
        let rows = vec![
            with_temp("STALE", t(12, 0, 0) - Duration::days(3), 20.0),
            with_temp("A", t(12, 0, 0), 25.0),
            with_temp("A", t(13, 0, 0), 26.0),
        ];
        let all = resample_recent(
            &rows,
            &Normalizer::default(),
            Grid::default(),
            t(12, 0, 0),
            Duration::hours(24),
        );
        assert_eq!(all.len(), 1);
        assert_eq!(all[&station("A")].points.len(), 1);
    }

    #[test]
    fn test_station_without_counter_has_no_rain() {
        // ---
        let rows = vec![with_temp("A", t(12, 0, 0), 25.0)];
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        assert_eq!(series.points[0].rain_cumulative, None);
        assert_eq!(series.rain_deltas(), None);
        assert!(series.delta_series().is_empty());
    }

    #[test]
    fn test_unsorted_input_and_aliases_are_merged() {
        // ---
        let rows = vec![
            with_temp("CEMADEN - A (x)", t(12, 2, 0), 22.0),
            with_temp("A", t(12, 0, 0), 20.0),
            with_temp("B", t(12, 1, 0), 99.0),
        ];
        let all = resample_all(&rows, &Normalizer::default(), Grid::default());
        assert_eq!(all.len(), 2);
        let a = &all[&station("A")];
        assert_eq!(a.first_timestamp(), Some(t(12, 0, 0)));
        assert_eq!(a.last_timestamp(), Some(t(12, 2, 0)));
        assert_eq!(a.points[1].air_temperature, Some(21.0));
    }

    #[test]
    fn test_edges_are_not_extrapolated() {
        // ---
        let mut values = vec![None, Some(1.0), None, Some(3.0), None];
        interpolate_interior(&mut values);
        assert_eq!(values, vec![None, Some(1.0), Some(2.0), Some(3.0), None]);

        let mut lone = vec![None, Some(5.0), None];
        interpolate_interior(&mut lone);
        assert_eq!(lone, vec![None, Some(5.0), None]);
    }

    #[test]
    fn test_unknown_station_resamples_to_none() {
        // ---
        let rows = vec![with_temp("A", t(12, 0, 0), 20.0)];
        assert!(resample(&rows, &station("Z"), &Normalizer::default(), Grid::default()).is_none());
    }

    #[test]
    fn test_coarsen_sums_rain_and_averages_fields() {
        // ---
        let rows: Vec<_> = (0..20)
            .map(|m| MunicipalReading {
                air_temperature: Some(20.0 + f64::from(m % 2)),
                rain_cumulative: Some(f64::from(m)),
                ..reading("A", t(12, m, 0))
            })
            .collect();
        let series = resample(&rows, &station("A"), &Normalizer::default(), Grid::default()).unwrap();
        let chart = series.coarsen(Grid::minutes(10).unwrap());

        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].timestamp, t(12, 0, 0));
        assert_eq!(chart[0].air_temperature, Some(20.5));
        // first tick has no predecessor, so 9 mm in the first bucket, 10 in the second
        assert_eq!(chart[0].rain_mm, Some(9.0));
        assert_eq!(chart[1].rain_mm, Some(10.0));
        assert_eq!(chart[1].rain_cumulative, Some(19.0));
    }
}
