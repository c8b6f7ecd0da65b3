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

//! Date/time arithmetic and the `Today`/`Now` system functions.
//!
//! `Today()`/`Now()`/`TimeOfDay()` all derive from a single clock read,
//! cached on [`crate::context::EvaluationContext`] and taken once per
//! evaluation — two calls in the same evaluation (or one inside a loop or
//! aggregate) never observe a clock tick between them. `*_at` here take
//! that cached reading rather than sampling the clock themselves.

use crate::error::EvalResult;
use chrono::{DateTime, Datelike, Local, Offset, Timelike};
use octofhir_cql_core::{PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity, TemporalUnit, Value};
use rust_decimal::prelude::ToPrimitive;

fn unit_of(quantity: &Quantity) -> TemporalUnit {
    quantity
        .unit
        .as_deref()
        .and_then(TemporalUnit::from_ucum_or_alias)
        .unwrap_or(TemporalUnit::Day)
}

fn amount_of(quantity: &Quantity) -> i64 {
    quantity.value.to_i64().unwrap_or(0)
}

pub fn add_quantity_to_date(date: PrecisionDate, quantity: &Quantity) -> EvalResult<PrecisionDate> {
    Ok(date.add(amount_of(quantity), unit_of(quantity)))
}

pub fn subtract_quantity_from_date(date: PrecisionDate, quantity: &Quantity) -> EvalResult<PrecisionDate> {
    Ok(date.add(-amount_of(quantity), unit_of(quantity)))
}

pub fn add_quantity_to_datetime(dt: PrecisionDateTime, quantity: &Quantity) -> EvalResult<PrecisionDateTime> {
    Ok(dt.add(amount_of(quantity), unit_of(quantity)))
}

pub fn subtract_quantity_from_datetime(dt: PrecisionDateTime, quantity: &Quantity) -> EvalResult<PrecisionDateTime> {
    Ok(dt.add(-amount_of(quantity), unit_of(quantity)))
}

pub fn today_at(now: DateTime<Local>) -> Value {
    Value::Date(PrecisionDate::full(now.year(), now.month(), now.day()))
}

pub fn now_at(now: DateTime<Local>) -> Value {
    let date = PrecisionDate::full(now.year(), now.month(), now.day());
    let time = PrecisionTime::new(now.hour(), Some(now.minute()), Some(now.second()), Some(now.nanosecond() / 1_000_000));
    let offset_minutes = now.offset().local_minus_utc() / 60;
    Value::DateTime(PrecisionDateTime::new(date, Some(time), Some(offset_minutes)))
}

pub fn time_of_day_at(now: DateTime<Local>) -> Value {
    Value::Time(PrecisionTime::new(now.hour(), Some(now.minute()), Some(now.second()), Some(now.nanosecond() / 1_000_000)))
}

pub fn date_from(v: &Value) -> EvalResult<Value> {
    Ok(match v {
        Value::DateTime(dt) => Value::Date(dt.date),
        Value::Date(d) => Value::Date(*d),
        Value::Null => Value::Null,
        _ => Value::Null,
    })
}

pub fn time_from(v: &Value) -> EvalResult<Value> {
    Ok(match v {
        Value::DateTime(dt) => dt.time.map(Value::Time).unwrap_or(Value::Null),
        Value::Time(t) => Value::Time(*t),
        _ => Value::Null,
    })
}

/// `DurationBetween`/`DifferenceBetween` share the same operand shapes and
/// differ only in whether a partial final unit counts (calendar
/// "difference" truncates, elapsed "duration" counts whole units); the
/// evaluator passes `truncate` accordingly.
pub fn years_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    octofhir_cql_core::calendar_years_between(from, to)
}

pub fn months_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    octofhir_cql_core::calendar_months_between(from, to)
}

pub fn days_between(from: &PrecisionDate, to: &PrecisionDate) -> i64 {
    octofhir_cql_core::elapsed_days_between(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_a_month_quantity_to_a_date_uses_calendar_math() {
        let date = PrecisionDate::full(2024, 1, 31);
        let q = Quantity::with_unit(rust_decimal::Decimal::from(1), "mo");
        let result = add_quantity_to_date(date, &q).unwrap();
        assert_eq!(result.year, 2024);
        assert_eq!(result.month, Some(2));
    }

    #[test]
    fn date_from_extracts_date_component() {
        let dt = PrecisionDateTime::new(PrecisionDate::full(2024, 6, 1), None, None);
        assert_eq!(date_from(&Value::DateTime(dt)).unwrap(), Value::Date(PrecisionDate::full(2024, 6, 1)));
    }

    #[test]
    fn today_and_now_at_agree_on_the_same_clock_reading() {
        let instant = Local::now();
        match (today_at(instant), now_at(instant)) {
            (Value::Date(date), Value::DateTime(dt)) => assert_eq!(date, dt.date),
            other => panic!("expected (Date, DateTime), got {other:?}"),
        }
    }
}
