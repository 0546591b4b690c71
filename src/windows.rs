//! Trailing-window aggregates anchored to a reference time.
//!
//! Windows are half-open, `(reference - length, reference]`, and applied per
//! canonical station. The reference time is normally the latest observation
//! in the working set rather than the wall clock, so results stay
//! reproducible when data arrives late.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::normalize::CanonicalStation;

// ---

/// The fixed set of rainfall accumulation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WindowLength {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl WindowLength {
    pub const ALL: [WindowLength; 4] = [
        WindowLength::OneHour,
        WindowLength::SixHours,
        WindowLength::TwelveHours,
        WindowLength::TwentyFourHours,
    ];

    pub fn duration(self) -> Duration {
        match self {
            WindowLength::OneHour => Duration::hours(1),
            WindowLength::SixHours => Duration::hours(6),
            WindowLength::TwelveHours => Duration::hours(12),
            WindowLength::TwentyFourHours => Duration::hours(24),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WindowLength::OneHour => "1h",
            WindowLength::SixHours => "6h",
            WindowLength::TwelveHours => "12h",
            WindowLength::TwentyFourHours => "24h",
        }
    }
}

/// Statistic for [`window_stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Min,
    Max,
    Mean,
}

/// Latest timestamp in the working set.
pub fn reference_time<I>(timestamps: I) -> Option<NaiveDateTime>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    timestamps.into_iter().max()
}

fn in_window(ts: NaiveDateTime, reference: NaiveDateTime, length: Duration) -> bool {
    ts > reference - length && ts <= reference
}

/// Sum of deltas inside the window; `0` when nothing falls inside.
pub fn window_sum(
    deltas: &[(NaiveDateTime, f64)],
    reference: NaiveDateTime,
    length: Duration,
) -> f64 {
    // ---
    deltas
        .iter()
        .filter(|(ts, _)| in_window(*ts, reference, length))
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .sum()
}

/// Min/max/mean of non-null values inside the window; `None` when there are
/// none (a station reporting nothing is not a station reporting zero).
pub fn window_stat(
    series: &[(NaiveDateTime, Option<f64>)],
    reference: NaiveDateTime,
    length: Duration,
    stat: Stat,
) -> Option<f64> {
    // ---
    let values = series
        .iter()
        .filter(|(ts, _)| in_window(*ts, reference, length))
        .filter_map(|(_, v)| *v);
    let summary = describe(values);
    match stat {
        Stat::Min => summary.min,
        Stat::Max => summary.max,
        Stat::Mean => summary.mean,
    }
}

// ---

/// count/mean/min/max/sum of a set of values, ignoring non-finite ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Descriptive {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
}

pub fn describe<I>(values: I) -> Descriptive
where
    I: IntoIterator<Item = f64>,
{
    // ---
    let mut out = Descriptive {
        count: 0,
        mean: None,
        min: None,
        max: None,
        sum: 0.0,
    };
    for v in values.into_iter().filter(|v| v.is_finite()) {
        out.count += 1;
        out.sum += v;
        out.min = Some(out.min.map_or(v, |m| m.min(v)));
        out.max = Some(out.max.map_or(v, |m| m.max(v)));
    }
    if out.count > 0 {
        out.mean = Some(out.sum / out.count as f64);
    }
    out
}

/// Rainfall totals per window, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RainWindows {
    pub h1: f64,
    pub h6: f64,
    pub h12: f64,
    pub h24: f64,
}

impl RainWindows {
    pub fn get(&self, length: WindowLength) -> f64 {
        match length {
            WindowLength::OneHour => self.h1,
            WindowLength::SixHours => self.h6,
            WindowLength::TwelveHours => self.h12,
            WindowLength::TwentyFourHours => self.h24,
        }
    }
}

/// All four rainfall windows for one station's delta series.
pub fn rain_windows(deltas: &[(NaiveDateTime, f64)], reference: NaiveDateTime) -> RainWindows {
    // ---
    let sum = |length: WindowLength| window_sum(deltas, reference, length.duration());
    RainWindows {
        h1: sum(WindowLength::OneHour),
        h6: sum(WindowLength::SixHours),
        h12: sum(WindowLength::TwelveHours),
        h24: sum(WindowLength::TwentyFourHours),
    }
}

/// Mean/min/max of one continuous field over a window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FieldStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn field_stats(
    series: &[(NaiveDateTime, Option<f64>)],
    reference: NaiveDateTime,
    length: Duration,
) -> FieldStats {
    // ---
    let values = series
        .iter()
        .filter(|(ts, _)| in_window(*ts, reference, length))
        .filter_map(|(_, v)| *v);
    let d = describe(values);
    FieldStats {
        mean: d.mean,
        min: d.min,
        max: d.max,
    }
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

/// The station and time at which a field peaked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extreme {
    pub station: CanonicalStation,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Pick the max or min across all candidates.
///
/// Ties go to the earliest timestamp, then to the first station in name
/// order. NaN candidates are ignored.
pub fn extreme<'a, I>(candidates: I, which: Extremum) -> Option<Extreme>
where
    I: IntoIterator<Item = (&'a CanonicalStation, NaiveDateTime, f64)>,
{
    // ---
    let mut best: Option<(&CanonicalStation, NaiveDateTime, f64)> = None;
    for (station, ts, value) in candidates {
        if value.is_nan() {
            continue;
        }
        let replace = match best {
            None => true,
            Some((b_station, b_ts, b_value)) => {
                let better = match which {
                    Extremum::Max => value > b_value,
                    Extremum::Min => value < b_value,
                };
                better || (value == b_value && (ts, station) < (b_ts, b_station))
            }
        };
        if replace {
            best = Some((station, ts, value));
        }
    }
    best.map(|(station, timestamp, value)| Extreme {
        station: station.clone(),
        timestamp,
        value,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::normalize::Normalizer;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_window_is_right_closed_left_open() {
        // ---
        let deltas = vec![(t(11, 0), 5.0), (t(11, 1), 1.0), (t(12, 0), 2.0)];
        // (11:00, 12:00] excludes 11:00 and includes 12:00
        assert_eq!(window_sum(&deltas, t(12, 0), Duration::hours(1)), 3.0);
    }

    #[test]
    fn test_empty_window_sum_is_zero_but_stats_are_none() {
        // ---
        assert_eq!(window_sum(&[], t(12, 0), Duration::hours(1)), 0.0);
        let series = vec![(t(8, 0), Some(25.0))];
        assert_eq!(
            window_stat(&series, t(12, 0), Duration::hours(1), Stat::Mean),
            None
        );
    }

    #[test]
    fn test_window_stat_ignores_nulls() {
        // ---
        let series = vec![
            (t(11, 30), Some(24.0)),
            (t(11, 40), None),
            (t(11, 50), Some(28.0)),
        ];
        let r = t(12, 0);
        let h = Duration::hours(1);
        assert_eq!(window_stat(&series, r, h, Stat::Min), Some(24.0));
        assert_eq!(window_stat(&series, r, h, Stat::Max), Some(28.0));
        assert_eq!(window_stat(&series, r, h, Stat::Mean), Some(26.0));
    }

    #[test]
    fn test_rain_windows_are_nested() {
        // ---
        let deltas: Vec<_> = (0..24).map(|h| (t(h, 30), 1.0)).collect();
        let w = rain_windows(&deltas, t(23, 30));
        assert_eq!(w.h1, 1.0);
        assert_eq!(w.h6, 6.0);
        assert_eq!(w.h12, 12.0);
        assert_eq!(w.h24, 24.0);
        assert!(w.h24 >= w.h12 && w.h12 >= w.h6 && w.h6 >= w.h1);
    }

    #[test]
    fn test_reference_time_is_latest() {
        // ---
        assert_eq!(reference_time(vec![t(9, 0), t(12, 0), t(10, 0)]), Some(t(12, 0)));
        assert_eq!(reference_time(Vec::new()), None);
    }

    #[test]
    fn test_describe() {
        // ---
        let d = describe(vec![1.0, 2.0, f64::NAN, 6.0]);
        assert_eq!(d.count, 3);
        assert_eq!(d.sum, 9.0);
        assert_eq!(d.mean, Some(3.0));
        assert_eq!(d.min, Some(1.0));
        assert_eq!(d.max, Some(6.0));
        assert_eq!(describe(Vec::new()).mean, None);
    }

    #[test]
    fn test_extreme_breaks_ties_by_first_timestamp() {
        // ---
        let n = Normalizer::default();
        let a = n.canonical("A");
        let b = n.canonical("B");
        let candidates = vec![
            (&b, t(14, 0), 33.0),
            (&a, t(15, 0), 33.0),
            (&a, t(13, 0), 31.0),
            (&b, t(12, 0), f64::NAN),
        ];
        let max = extreme(candidates.clone(), Extremum::Max).unwrap();
        assert_eq!(max.station, b);
        assert_eq!(max.timestamp, t(14, 0));

        let min = extreme(candidates, Extremum::Min).unwrap();
        assert_eq!(min.station, a);
        assert_eq!(min.value, 31.0);
    }

    #[test]
    fn test_extreme_same_time_prefers_first_station() {
        // ---
        let n = Normalizer::default();
        let a = n.canonical("A");
        let b = n.canonical("B");
        let candidates = vec![(&b, t(14, 0), 10.0), (&a, t(14, 0), 10.0)];
        assert_eq!(extreme(candidates, Extremum::Max).unwrap().station, a);
        assert!(extreme(Vec::new(), Extremum::Min).is_none());
    }
}
