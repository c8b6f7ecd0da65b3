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

//! Interval relational operators, thin wrappers over
//! [`octofhir_cql_core::Interval`]'s Allen-relation machinery. Every
//! three-valued comparison here propagates `None` to `Value::Null` rather
//! than collapsing to `false`.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::{Interval, Value};

fn as_interval<'a>(v: &'a Value, op: &str) -> EvalResult<&'a Interval> {
    match v {
        Value::Interval(i) => Ok(i.as_ref()),
        _ => Err(EvalError::TypeMismatch { op: op.into(), expected: "Interval".into(), actual: v.kind() }),
    }
}

fn from_option(r: Option<bool>) -> Value {
    match r {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    }
}

pub fn overlaps(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "Overlaps")?.overlaps(as_interval(b, "Overlaps")?)))
}

pub fn during(point_or_interval: &Value, container: &Value) -> EvalResult<Value> {
    let container = as_interval(container, "During")?;
    match point_or_interval {
        Value::Interval(inner) => Ok(from_option(inner.during(container))),
        point => Ok(from_option(container.contains_point(point))),
    }
}

pub fn before(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "Before")?.before(as_interval(b, "Before")?)))
}

pub fn after(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "After")?.after(as_interval(b, "After")?)))
}

pub fn starts(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "Starts")?.starts(as_interval(b, "Starts")?)))
}

pub fn ends(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "Ends")?.ends(as_interval(b, "Ends")?)))
}

pub fn width(a: &Value) -> EvalResult<Value> {
    Ok(as_interval(a, "Width")?.width().unwrap_or(Value::Null))
}

pub fn contains(a: &Value, point: &Value) -> EvalResult<Value> {
    Ok(from_option(as_interval(a, "Contains")?.contains_point(point)))
}

pub fn includes(a: &Value, point_or_interval: &Value) -> EvalResult<Value> {
    let a = as_interval(a, "IntervalIn")?;
    match point_or_interval {
        Value::Interval(inner) => Ok(from_option(a.includes(inner))),
        point => Ok(from_option(a.contains_point(point))),
    }
}

pub fn start(a: &Value) -> EvalResult<Value> {
    Ok(as_interval(a, "Start")?.low.clone())
}

pub fn end(a: &Value) -> EvalResult<Value> {
    Ok(as_interval(a, "End")?.high.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn int_interval(lo: i64, hi: i64) -> Value {
        Value::Interval(Box::new(
            Interval::new(Value::Integer(lo), Value::Integer(hi), true, true).unwrap(),
        ))
    }

    #[test]
    fn overlaps_detects_shared_range() {
        let a = int_interval(1, 5);
        let b = int_interval(4, 8);
        assert_eq!(overlaps(&a, &b).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn during_tests_a_point_against_an_interval() {
        let container = int_interval(1, 10);
        assert_eq!(during(&Value::Integer(5), &container).unwrap(), Value::Boolean(true));
        assert_eq!(during(&Value::Integer(20), &container).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn width_subtracts_bounds() {
        let a = int_interval(2, 9);
        assert_eq!(width(&a).unwrap(), Value::Integer(7));
    }

    #[test]
    fn start_and_end_return_the_bounds() {
        let a = Value::Interval(Box::new(
            Interval::new(Value::Decimal(Decimal::ONE), Value::Decimal(Decimal::TEN), true, true).unwrap(),
        ));
        assert_eq!(start(&a).unwrap(), Value::Decimal(Decimal::ONE));
        assert_eq!(end(&a).unwrap(), Value::Decimal(Decimal::TEN));
    }
}
