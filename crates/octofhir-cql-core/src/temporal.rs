// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Precision-aware Date/DateTime/Time and the calendar-vs-elapsed arithmetic
//! the CQL and FHIRPath temporal operators require.
//!
//! A missing component (e.g. `@2024` has no month) is not the same as a
//! zero component: comparisons between values of different precision at the
//! differing position return `None` ("unknown"), mirroring
//! `Quantity::has_compatible_dimensions` returning a tri-state rather than
//! panicking on a dimension mismatch.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::cmp::Ordering;
use std::fmt;

/// Granularity of a temporal value. Ordered coarsest-to-finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// Calendar-duration units (`years`, `months`, ...) use calendar math;
/// elapsed-duration units (`days`, `hours`, ...) use fixed-length math.
/// Converting across the boundary is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TemporalUnit {
    pub fn is_calendar(self) -> bool {
        matches!(self, TemporalUnit::Year | TemporalUnit::Month)
    }

    pub fn from_ucum_or_alias(code: &str) -> Option<Self> {
        Some(match code {
            "a" | "year" | "years" => TemporalUnit::Year,
            "mo" | "month" | "months" => TemporalUnit::Month,
            "wk" | "week" | "weeks" => TemporalUnit::Week,
            "d" | "day" | "days" => TemporalUnit::Day,
            "h" | "hour" | "hours" => TemporalUnit::Hour,
            "min" | "minute" | "minutes" => TemporalUnit::Minute,
            "s" | "second" | "seconds" => TemporalUnit::Second,
            "ms" | "millisecond" | "milliseconds" => TemporalUnit::Millisecond,
            _ => return None,
        })
    }

    pub fn precision(self) -> Precision {
        match self {
            TemporalUnit::Year => Precision::Year,
            TemporalUnit::Month => Precision::Month,
            TemporalUnit::Week | TemporalUnit::Day => Precision::Day,
            TemporalUnit::Hour => Precision::Hour,
            TemporalUnit::Minute => Precision::Minute,
            TemporalUnit::Second => Precision::Second,
            TemporalUnit::Millisecond => Precision::Millisecond,
        }
    }
}

/// A calendar date with a possibly-partial precision: `@2024`, `@2024-03`,
/// or `@2024-03-15` are all representable and distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecisionDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PrecisionDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    pub fn year_month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    pub fn full(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    pub fn precision(&self) -> Precision {
        if self.day.is_some() {
            Precision::Day
        } else if self.month.is_some() {
            Precision::Month
        } else {
            Precision::Year
        }
    }

    pub fn to_naive(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(self.year, 1, 1).unwrap())
    }

    /// Compare two dates, returning `None` when the shallower precision of
    /// the two cannot distinguish them (`@2024-01 = @2024-01-15`
    /// is `Null`, not `false`).
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let prec = self.precision().min(other.precision());
        compare_at_precision(
            (self.year, self.month, self.day),
            (other.year, other.month, other.day),
            prec,
        )
    }

    pub fn add(&self, quantity: i64, unit: TemporalUnit) -> Self {
        match unit {
            TemporalUnit::Year => Self {
                year: self.year + quantity as i32,
                month: self.month,
                day: self.day,
            },
            TemporalUnit::Month => {
                let month = self.month.unwrap_or(1) as i64;
                let total = (self.year as i64) * 12 + (month - 1) + quantity;
                let year = total.div_euclid(12) as i32;
                let month = (total.rem_euclid(12) + 1) as u32;
                Self {
                    year,
                    month: Some(month),
                    day: self.day,
                }
            }
            _ => {
                let delta = elapsed_duration(quantity, unit);
                let naive = self.to_naive() + delta;
                Self {
                    year: naive.year(),
                    month: Some(naive.month()),
                    day: Some(naive.day()),
                }
            }
        }
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{m:02}")?;
            if let Some(d) = self.day {
                write!(f, "-{d:02}")?;
            }
        }
        Ok(())
    }
}

/// A time-of-day with partial precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecisionTime {
    pub hour: u32,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub millisecond: Option<u32>,
}

impl PrecisionTime {
    pub fn new(
        hour: u32,
        minute: Option<u32>,
        second: Option<u32>,
        millisecond: Option<u32>,
    ) -> Self {
        Self {
            hour,
            minute,
            second,
            millisecond,
        }
    }

    pub fn precision(&self) -> Precision {
        if self.millisecond.is_some() {
            Precision::Millisecond
        } else if self.second.is_some() {
            Precision::Second
        } else if self.minute.is_some() {
            Precision::Minute
        } else {
            Precision::Hour
        }
    }

    pub fn to_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_milli_opt(
            self.hour,
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
            self.millisecond.unwrap_or(0),
        )
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let prec = self.precision().min(other.precision());
        compare_time_at_precision(
            (self.hour, self.minute, self.second, self.millisecond),
            (other.hour, other.minute, other.second, other.millisecond),
            prec,
        )
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.hour)?;
        if let Some(m) = self.minute {
            write!(f, ":{m:02}")?;
            if let Some(s) = self.second {
                write!(f, ":{s:02}")?;
                if let Some(ms) = self.millisecond {
                    write!(f, ".{ms:03}")?;
                }
            }
        }
        Ok(())
    }
}

/// A date-time with partial precision and an optional fixed UTC-offset
/// timezone (in minutes). `None` means "no timezone specified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecisionDateTime {
    pub date: PrecisionDate,
    pub time: Option<PrecisionTime>,
    pub tz_offset_minutes: Option<i32>,
}

impl PrecisionDateTime {
    pub fn new(date: PrecisionDate, time: Option<PrecisionTime>, tz_offset_minutes: Option<i32>) -> Self {
        Self {
            date,
            time,
            tz_offset_minutes,
        }
    }

    pub fn precision(&self) -> Precision {
        self.time
            .map(|t| t.precision())
            .unwrap_or_else(|| self.date.precision())
    }

    pub fn to_naive(&self) -> NaiveDateTime {
        NaiveDateTime::new(
            self.date.to_naive(),
            self.time.map(|t| t.to_naive()).unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
        )
    }

    /// Normalize to UTC (minutes offset 0) when both sides carry a timezone,
    /// so calendar comparisons see the same instant. Values with no
    /// timezone compare in local/naive terms, as the spec requires no
    /// implicit zone assumption.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let prec = self.precision().min(other.precision());
        if prec < Precision::Day {
            return self.date.compare(&other.date);
        }
        let (a, b) = match (self.tz_offset_minutes, other.tz_offset_minutes) {
            (Some(off_a), Some(off_b)) => {
                let naive_a = self.to_naive() - Duration::minutes(off_a as i64);
                let naive_b = other.to_naive() - Duration::minutes(off_b as i64);
                (naive_a, naive_b)
            }
            _ => (self.to_naive(), other.to_naive()),
        };
        let date_cmp = compare_at_precision(
            (self.date.year, self.date.month, self.date.day),
            (other.date.year, other.date.month, other.date.day),
            prec.min(Precision::Day),
        )?;
        if date_cmp != Ordering::Equal || prec == Precision::Day {
            return Some(date_cmp);
        }
        let time_a = a.time();
        let time_b = b.time();
        let self_time = self.time.unwrap_or(PrecisionTime::new(0, None, None, None));
        let other_time = other.time.unwrap_or(PrecisionTime::new(0, None, None, None));
        let time_prec = self_time.precision().min(other_time.precision());
        compare_time_at_precision(
            (time_a.hour(), Some(time_a.minute()), Some(time_a.second()), Some(time_a.nanosecond() / 1_000_000)),
            (time_b.hour(), Some(time_b.minute()), Some(time_b.second()), Some(time_b.nanosecond() / 1_000_000)),
            time_prec,
        )
    }

    pub fn add(&self, quantity: i64, unit: TemporalUnit) -> Self {
        if unit.is_calendar() {
            Self {
                date: self.date.add(quantity, unit),
                time: self.time,
                tz_offset_minutes: self.tz_offset_minutes,
            }
        } else {
            let delta = elapsed_duration(quantity, unit);
            let naive = self.to_naive() + delta;
            Self {
                date: PrecisionDate::full(naive.year(), naive.month(), naive.day()),
                time: Some(PrecisionTime::new(
                    naive.hour(),
                    Some(naive.minute()),
                    Some(naive.second()),
                    Some(naive.and_utc().timestamp_subsec_millis()),
                )),
                tz_offset_minutes: self.tz_offset_minutes,
            }
        }
    }
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(time) = &self.time {
            write!(f, "T{time}")?;
            match self.tz_offset_minutes {
                Some(0) => write!(f, "Z")?,
                Some(offset) => {
                    let sign = if offset < 0 { '-' } else { '+' };
                    write!(f, "{sign}{:02}:{:02}", offset.abs() / 60, offset.abs() % 60)?;
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn elapsed_duration(quantity: i64, unit: TemporalUnit) -> Duration {
    match unit {
        TemporalUnit::Week => Duration::weeks(quantity),
        TemporalUnit::Day => Duration::days(quantity),
        TemporalUnit::Hour => Duration::hours(quantity),
        TemporalUnit::Minute => Duration::minutes(quantity),
        TemporalUnit::Second => Duration::seconds(quantity),
        TemporalUnit::Millisecond => Duration::milliseconds(quantity),
        TemporalUnit::Year | TemporalUnit::Month => unreachable!("calendar units handled separately"),
    }
}

fn compare_at_precision(
    a: (i32, Option<u32>, Option<u32>),
    b: (i32, Option<u32>, Option<u32>),
    precision: Precision,
) -> Option<Ordering> {
    match a.0.cmp(&b.0) {
        Ordering::Equal => {}
        ord => return Some(ord),
    }
    if precision == Precision::Year {
        return Some(Ordering::Equal);
    }
    match (a.1, b.1) {
        (Some(ma), Some(mb)) => match ma.cmp(&mb) {
            Ordering::Equal => {}
            ord => return Some(ord),
        },
        _ => return None,
    }
    if precision == Precision::Month {
        return Some(Ordering::Equal);
    }
    match (a.2, b.2) {
        (Some(da), Some(db)) => Some(da.cmp(&db)),
        _ => None,
    }
}

fn compare_time_at_precision(
    a: (u32, Option<u32>, Option<u32>, Option<u32>),
    b: (u32, Option<u32>, Option<u32>, Option<u32>),
    precision: Precision,
) -> Option<Ordering> {
    match a.0.cmp(&b.0) {
        Ordering::Equal => {}
        ord => return Some(ord),
    }
    if precision == Precision::Hour {
        return Some(Ordering::Equal);
    }
    match (a.1, b.1) {
        (Some(ma), Some(mb)) => match ma.cmp(&mb) {
            Ordering::Equal => {}
            ord => return Some(ord),
        },
        _ => return None,
    }
    if precision == Precision::Minute {
        return Some(Ordering::Equal);
    }
    match (a.2, b.2) {
        (Some(sa), Some(sb)) => match sa.cmp(&sb) {
            Ordering::Equal => {}
            ord => return Some(ord),
        },
        _ => return None,
    }
    if precision == Precision::Second {
        return Some(Ordering::Equal);
    }
    match (a.3, b.3) {
        (Some(msa), Some(msb)) => Some(msa.cmp(&msb)),
        _ => None,
    }
}

/// Whole calendar years between two dates (`years between` uses calendar
/// math, never converts to elapsed units).
pub fn calendar_years_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    let mut years = (to.year - from.year) as i64;
    let from_month = from.month.unwrap_or(1);
    let to_month = to.month.unwrap_or(1);
    let from_day = from.day.unwrap_or(1);
    let to_day = to.day.unwrap_or(1);
    if (to_month, to_day) < (from_month, from_day) {
        years -= 1;
    }
    years
}

pub fn calendar_months_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    let mut months =
        (to.year as i64 - from.year as i64) * 12 + (to.month.unwrap_or(1) as i64 - from.month.unwrap_or(1) as i64);
    if to.day.unwrap_or(1) < from.day.unwrap_or(1) {
        months -= 1;
    }
    months
}

pub fn elapsed_days_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    (to.to_naive() - from.to_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_precision_comparison_is_null() {
        let a = PrecisionDate::year_month(2024, 1);
        let b = PrecisionDate::full(2024, 1, 15);
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn same_precision_comparison_is_total() {
        let a = PrecisionDate::full(2024, 1, 1);
        let b = PrecisionDate::full(2024, 1, 15);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn month_addition_rolls_over_year() {
        let d = PrecisionDate::full(2024, 11, 15);
        let added = d.add(3, TemporalUnit::Month);
        assert_eq!(added, PrecisionDate::full(2025, 2, 15));
    }

    #[test]
    fn calendar_years_between_rounds_down() {
        let from = PrecisionDate::full(1990, 1, 1);
        let to = PrecisionDate::full(2024, 6, 15);
        assert_eq!(calendar_years_between(&from, &to), 34);
    }
}
