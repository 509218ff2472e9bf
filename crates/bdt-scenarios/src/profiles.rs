//! Deterministic synthetic profile construction.
//!
//! Profiles are simple parametric shapes evaluated over a time grid, used
//! by integration tests, benchmarks and the CLI's scenario materializer.
//! All shapes are pure functions of the timestamp, so materialization is
//! reproducible bit for bit.

use bdt_core::TimeGrid;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Parametric profile shape, one value per grid step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileSpec {
    /// The same value at every step
    Constant { value: f64 },
    /// `elevated` during the daily hours `[from_hour, to_hour)`, `base`
    /// otherwise
    DailyBlock {
        base: f64,
        elevated: f64,
        from_hour: u32,
        to_hour: u32,
    },
    /// `low` before `split_hour` (hour of day), `high` from it onward
    HalfDaySplit { low: f64, high: f64, split_hour: u32 },
    /// Half-sine solar bell between `[from_hour, to_hour)` peaking at
    /// `peak_kw`, zero outside
    SolarBell {
        peak_kw: f64,
        from_hour: u32,
        to_hour: u32,
    },
    /// `base` everywhere, `spike` during `[from_hour, to_hour)` on the
    /// listed zero-based horizon days
    DaySpike {
        base: f64,
        spike: f64,
        days: Vec<u32>,
        from_hour: u32,
        to_hour: u32,
    },
}

impl ProfileSpec {
    /// Evaluate the profile over a grid.
    pub fn evaluate(&self, grid: &TimeGrid) -> Vec<f64> {
        let start_day = grid.start().date();
        (0..grid.len())
            .map(|t| {
                let ts = grid.timestamp(t);
                let hour = ts.hour();
                match self {
                    ProfileSpec::Constant { value } => *value,
                    ProfileSpec::DailyBlock {
                        base,
                        elevated,
                        from_hour,
                        to_hour,
                    } => {
                        if hour >= *from_hour && hour < *to_hour {
                            *elevated
                        } else {
                            *base
                        }
                    }
                    ProfileSpec::HalfDaySplit {
                        low,
                        high,
                        split_hour,
                    } => {
                        if hour < *split_hour {
                            *low
                        } else {
                            *high
                        }
                    }
                    ProfileSpec::SolarBell {
                        peak_kw,
                        from_hour,
                        to_hour,
                    } => {
                        let h = ts.hour() as f64 + ts.minute() as f64 / 60.0;
                        let lo = *from_hour as f64;
                        let hi = *to_hour as f64;
                        if h >= lo && h < hi && hi > lo {
                            let phase = (h - lo) / (hi - lo);
                            peak_kw * (std::f64::consts::PI * phase).sin()
                        } else {
                            0.0
                        }
                    }
                    ProfileSpec::DaySpike {
                        base,
                        spike,
                        days,
                        from_hour,
                        to_hour,
                    } => {
                        let day =
                            ts.date().signed_duration_since(start_day).num_days() as u32;
                        if days.contains(&day) && hour >= *from_hour && hour < *to_hour {
                            *spike
                        } else {
                            *base
                        }
                    }
                }
            })
            .collect()
    }
}

/// Time-of-use band assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TouSpec {
    /// Every step off-peak
    #[default]
    AllOffpeak,
    /// Peak band during the daily hours `[from_hour, to_hour)`
    DailyHours { from_hour: u32, to_hour: u32 },
}

impl TouSpec {
    pub fn evaluate(&self, grid: &TimeGrid) -> Vec<bool> {
        (0..grid.len())
            .map(|t| match self {
                TouSpec::AllOffpeak => false,
                TouSpec::DailyHours { from_hour, to_hour } => {
                    let hour = grid.timestamp(t).hour();
                    hour >= *from_hour && hour < *to_hour
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdt_core::Resolution;
    use chrono::NaiveDate;

    fn day_grid() -> TimeGrid {
        TimeGrid::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Resolution::Hourly,
            48,
        )
        .unwrap()
    }

    #[test]
    fn test_daily_block_repeats_each_day() {
        let p = ProfileSpec::DailyBlock {
            base: 20.0,
            elevated: 60.0,
            from_hour: 7,
            to_hour: 8,
        };
        let v = p.evaluate(&day_grid());
        assert_eq!(v[6], 20.0);
        assert_eq!(v[7], 60.0);
        assert_eq!(v[8], 20.0);
        assert_eq!(v[24 + 7], 60.0);
    }

    #[test]
    fn test_solar_bell_is_zero_at_night_and_positive_at_noon() {
        let p = ProfileSpec::SolarBell {
            peak_kw: 20.0,
            from_hour: 10,
            to_hour: 15,
        };
        let v = p.evaluate(&day_grid());
        assert_eq!(v[0], 0.0);
        assert_eq!(v[9], 0.0);
        assert!(v[12] > 15.0);
        assert!(v.iter().all(|x| *x >= 0.0 && *x <= 20.0 + 1e-9));
    }

    #[test]
    fn test_day_spike_targets_days() {
        let p = ProfileSpec::DaySpike {
            base: 5.0,
            spike: 40.0,
            days: vec![1],
            from_hour: 18,
            to_hour: 20,
        };
        let v = p.evaluate(&day_grid());
        assert_eq!(v[18], 5.0);
        assert_eq!(v[24 + 18], 40.0);
        assert_eq!(v[24 + 20], 5.0);
    }

    #[test]
    fn test_tou_daily_hours() {
        let tou = TouSpec::DailyHours {
            from_hour: 6,
            to_hour: 22,
        };
        let v = tou.evaluate(&day_grid());
        assert!(!v[5]);
        assert!(v[6]);
        assert!(v[21]);
        assert!(!v[22]);
    }
}
