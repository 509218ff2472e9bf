//! Discrete time grid for dispatch optimization.
//!
//! A [`TimeGrid`] is an ordered sequence of timestamps with a fixed step,
//! either hourly or quarter-hourly. Timestamps are generated from the start
//! and the step, so the grid is strictly monotonic with no gaps by
//! construction. Month boundaries are computable from any step index, which
//! the power-tariff logic relies on (demand charges reset per calendar
//! month).
//!
//! The power-tariff peak is always reported on an hourly basis. When the
//! grid is quarter-hourly, [`TimeGrid::hourly_peaks`] aggregates a power
//! series to hourly buckets by taking the maximum of the sub-steps in each
//! hour.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Optimization time resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 3600 s steps
    #[default]
    Hourly,
    /// 900 s steps
    QuarterHourly,
}

impl Resolution {
    /// Step duration in hours (1.0 or 0.25)
    pub fn step_hours(&self) -> f64 {
        match self {
            Resolution::Hourly => 1.0,
            Resolution::QuarterHourly => 0.25,
        }
    }

    /// Number of grid steps per hour
    pub fn steps_per_hour(&self) -> usize {
        match self {
            Resolution::Hourly => 1,
            Resolution::QuarterHourly => 4,
        }
    }

    /// Step duration in whole seconds
    pub fn step_seconds(&self) -> i64 {
        match self {
            Resolution::Hourly => 3600,
            Resolution::QuarterHourly => 900,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Hourly => write!(f, "hourly"),
            Resolution::QuarterHourly => write!(f, "quarter_hourly"),
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" | "1h" | "3600" => Ok(Resolution::Hourly),
            "quarter_hourly" | "quarter" | "15m" | "900" => Ok(Resolution::QuarterHourly),
            _ => Err(format!("Unknown resolution: {}", s)),
        }
    }
}

/// Ordered sequence of timestamps with a fixed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGrid {
    start: NaiveDateTime,
    resolution: Resolution,
    len: usize,
}

impl TimeGrid {
    /// Create a grid of `len` steps starting at `start`.
    ///
    /// The start must be aligned to the step (minute 0 for hourly grids,
    /// minutes 0/15/30/45 for quarter-hourly grids).
    pub fn new(start: NaiveDateTime, resolution: Resolution, len: usize) -> CoreResult<Self> {
        if len == 0 {
            return Err(CoreError::Config("time grid must have at least one step".into()));
        }
        if start.second() != 0 || start.nanosecond() != 0 {
            return Err(CoreError::Config(format!(
                "grid start {} is not aligned to a whole minute",
                start
            )));
        }
        let aligned = match resolution {
            Resolution::Hourly => start.minute() == 0,
            Resolution::QuarterHourly => start.minute() % 15 == 0,
        };
        if !aligned {
            return Err(CoreError::Config(format!(
                "grid start {} is not aligned to the {} step",
                start, resolution
            )));
        }
        Ok(Self {
            start,
            resolution,
            len,
        })
    }

    /// Create a grid covering one full calendar month.
    pub fn full_month(year: i32, month: u32, resolution: Resolution) -> CoreResult<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::Config(format!("invalid month {}-{:02}", year, month)))?;
        let start = first
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time");
        let days = days_in_month(year, month);
        let len = days as usize * 24 * resolution.steps_per_hour();
        Self::new(start, resolution, len)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Step duration in hours
    pub fn step_hours(&self) -> f64 {
        self.resolution.step_hours()
    }

    /// Number of steps T
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Timestamp of step `t` (start of the step's averaging interval)
    pub fn timestamp(&self, t: usize) -> NaiveDateTime {
        self.start + Duration::seconds(self.resolution.step_seconds() * t as i64)
    }

    /// Timestamp one step past the end of the grid
    pub fn end(&self) -> NaiveDateTime {
        self.timestamp(self.len)
    }

    /// Month key of step `t`: months since year 0, so consecutive months
    /// differ by exactly 1 across year boundaries.
    pub fn month_index(&self, t: usize) -> i32 {
        let ts = self.timestamp(t);
        ts.year() * 12 + ts.month0() as i32
    }

    /// Whether step `t` is the first step of a calendar month
    pub fn is_month_start(&self, t: usize) -> bool {
        let ts = self.timestamp(t);
        ts.day() == 1 && ts.hour() == 0 && ts.minute() == 0
    }

    /// Step indices of the calendar month containing step `t`
    pub fn month_steps(&self, t: usize) -> std::ops::Range<usize> {
        let key = self.month_index(t);
        let mut lo = t;
        while lo > 0 && self.month_index(lo - 1) == key {
            lo -= 1;
        }
        let mut hi = t + 1;
        while hi < self.len && self.month_index(hi) == key {
            hi += 1;
        }
        lo..hi
    }

    /// Number of days in the calendar month containing step `t`
    pub fn days_in_month_of(&self, t: usize) -> u32 {
        let ts = self.timestamp(t);
        days_in_month(ts.year(), ts.month())
    }

    /// Days remaining in the month from step `t` (inclusive of the step's
    /// own day), used to scale the rolling peak penalty.
    pub fn days_remaining_in_month(&self, t: usize) -> u32 {
        let ts = self.timestamp(t);
        days_in_month(ts.year(), ts.month()) - ts.day() + 1
    }

    /// Sub-grid of `len` steps starting at step `t0`.
    pub fn window(&self, t0: usize, len: usize) -> CoreResult<TimeGrid> {
        if t0 + len > self.len {
            return Err(CoreError::Data(format!(
                "window [{}, {}) exceeds grid length {}",
                t0,
                t0 + len,
                self.len
            )));
        }
        TimeGrid::new(self.timestamp(t0), self.resolution, len)
    }

    /// Aggregate a per-step power series to hourly buckets, taking the
    /// maximum of the sub-steps within each hour. On an hourly grid this is
    /// the identity. Buckets are aligned to wall-clock hours.
    pub fn hourly_peaks(&self, series: &[f64]) -> Vec<(NaiveDateTime, f64)> {
        let mut out: Vec<(NaiveDateTime, f64)> = Vec::new();
        for (t, &value) in series.iter().enumerate().take(self.len) {
            let ts = self.timestamp(t);
            let hour = ts
                .with_minute(0)
                .and_then(|x| x.with_second(0))
                .expect("truncating to the hour is always valid");
            match out.last_mut() {
                Some((h, max)) if *h == hour => {
                    if value > *max {
                        *max = value;
                    }
                }
                _ => out.push((hour, value)),
            }
        }
        out
    }

    /// Largest hourly-aggregated value of a power series over the grid.
    pub fn peak_hourly(&self, series: &[f64]) -> f64 {
        self.hourly_peaks(series)
            .into_iter()
            .map(|(_, v)| v)
            .fold(0.0_f64, f64::max)
    }
}

/// Days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid month");
    next.signed_duration_since(first).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_full_month_lengths() {
        let g = TimeGrid::full_month(2024, 1, Resolution::Hourly).unwrap();
        assert_eq!(g.len(), 744);
        let g = TimeGrid::full_month(2024, 2, Resolution::QuarterHourly).unwrap();
        // 2024 is a leap year
        assert_eq!(g.len(), 29 * 96);
    }

    #[test]
    fn test_alignment_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 20, 0)
            .unwrap();
        assert!(TimeGrid::new(start, Resolution::QuarterHourly, 4).is_err());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 15, 0)
            .unwrap();
        assert!(TimeGrid::new(start, Resolution::Hourly, 4).is_err());
        assert!(TimeGrid::new(start, Resolution::QuarterHourly, 4).is_ok());
    }

    #[test]
    fn test_month_boundaries() {
        // Two days straddling Jan -> Feb
        let g = TimeGrid::new(jan(31, 0), Resolution::Hourly, 48).unwrap();
        assert!(g.is_month_start(0) == false);
        assert!(g.is_month_start(24));
        assert_eq!(g.month_index(23) + 1, g.month_index(24));
        assert_eq!(g.month_steps(0), 0..24);
        assert_eq!(g.month_steps(30), 24..48);
    }

    #[test]
    fn test_days_remaining() {
        let g = TimeGrid::new(jan(30, 12), Resolution::Hourly, 24).unwrap();
        assert_eq!(g.days_remaining_in_month(0), 2);
        assert_eq!(g.days_in_month_of(0), 31);
    }

    #[test]
    fn test_hourly_peaks_aggregation() {
        let g = TimeGrid::new(jan(1, 0), Resolution::QuarterHourly, 8).unwrap();
        let series = [1.0, 4.0, 2.0, 3.0, 7.0, 5.0, 6.0, 0.0];
        let peaks = g.hourly_peaks(&series);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].1, 4.0);
        assert_eq!(peaks[1].1, 7.0);
        assert_eq!(g.peak_hourly(&series), 7.0);
    }

    #[test]
    fn test_hourly_grid_peaks_identity() {
        let g = TimeGrid::new(jan(1, 0), Resolution::Hourly, 3).unwrap();
        let series = [1.0, 3.0, 2.0];
        let peaks = g.hourly_peaks(&series);
        assert_eq!(peaks.iter().map(|(_, v)| *v).collect::<Vec<_>>(), series);
    }

    #[test]
    fn test_window() {
        let g = TimeGrid::full_month(2024, 1, Resolution::Hourly).unwrap();
        let w = g.window(24, 24).unwrap();
        assert_eq!(w.timestamp(0), jan(2, 0));
        assert!(g.window(740, 24).is_err());
    }
}
