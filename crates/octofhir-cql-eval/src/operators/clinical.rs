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

//! Clinical age helpers. `AgeInYears`/`AgeInMonths` with no argument measure
//! against `Today()`; with an `asOf` argument they measure against it
//! instead. Both delegate to the calendar-between arithmetic already used
//! by `DifferenceBetween` rather than reimplementing calendar math. The
//! caller passes in `Today()`'s date (the evaluation's cached clock
//! reading) rather than this module sampling the clock itself.

use super::temporal;
use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::{PrecisionDate, Value};

fn birth_date(birth_date: &Value, op: &str) -> EvalResult<PrecisionDate> {
    match birth_date {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date),
        _ => Err(EvalError::TypeMismatch { op: op.into(), expected: "Date or DateTime".into(), actual: birth_date.kind() }),
    }
}

fn as_of_date(as_of: &Value, today: PrecisionDate) -> PrecisionDate {
    match as_of {
        Value::Date(d) => *d,
        Value::DateTime(dt) => dt.date,
        _ => today,
    }
}

pub fn age_in_years(birth: &Value, as_of: Option<&Value>, today: PrecisionDate) -> EvalResult<Value> {
    if birth.is_null() {
        return Ok(Value::Null);
    }
    let birth = birth_date(birth, "AgeInYears")?;
    let reference = as_of.map(|v| as_of_date(v, today)).unwrap_or(today);
    Ok(Value::Integer(temporal::years_between(&birth, &reference)))
}

pub fn age_in_months(birth: &Value, as_of: Option<&Value>, today: PrecisionDate) -> EvalResult<Value> {
    if birth.is_null() {
        return Ok(Value::Null);
    }
    let birth = birth_date(birth, "AgeInMonths")?;
    let reference = as_of.map(|v| as_of_date(v, today)).unwrap_or(today);
    Ok(Value::Integer(temporal::months_between(&birth, &reference)))
}

pub fn calculate_age_at(birth: &Value, as_of: &Value, today: PrecisionDate) -> EvalResult<Value> {
    if birth.is_null() || as_of.is_null() {
        return Ok(Value::Null);
    }
    let birth = birth_date(birth, "CalculateAgeAt")?;
    let reference = as_of_date(as_of, today);
    Ok(Value::Integer(temporal::years_between(&birth, &reference)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_age_at_uses_calendar_years() {
        let birth = Value::Date(PrecisionDate::full(2000, 6, 15));
        let as_of = Value::Date(PrecisionDate::full(2024, 6, 14));
        let today = PrecisionDate::full(2024, 6, 14);
        assert_eq!(calculate_age_at(&birth, &as_of, today).unwrap(), Value::Integer(23));
    }

    #[test]
    fn age_in_years_is_null_for_null_birth_date() {
        let today = PrecisionDate::full(2024, 6, 14);
        assert_eq!(age_in_years(&Value::Null, None, today).unwrap(), Value::Null);
    }
}
