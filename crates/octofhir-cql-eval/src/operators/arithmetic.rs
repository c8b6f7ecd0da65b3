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

//! Numeric arithmetic and the single-operand math functions (`Ceiling`,
//! `Sqrt`, ...). CQL numeric division (`Divide`) always produces `Decimal`,
//! unlike `TruncatedDivide`/`Modulo`, which keep an integer-like result.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::{Quantity, Value, CONVERSION_SCALE};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

fn to_decimal(v: &Value) -> Decimal {
    match v {
        Value::Integer(i) => Decimal::from(*i),
        Value::Long(l) => Decimal::try_from(*l).unwrap_or_default(),
        Value::Decimal(d) => *d,
        _ => Decimal::ZERO,
    }
}

/// Any `Null` operand propagates straight to `Null`, the same as comparison's
/// `ordering()` short-circuit — never reaches `to_decimal`'s zero fallback.
fn null_propagates(a: &Value, b: &Value) -> bool {
    a.is_null() || b.is_null()
}

pub fn add(a: &Value, b: &Value, op_name: &str) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x
            .checked_add(*y)
            .map(Value::Integer)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Long(x), Value::Long(y)) => x
            .checked_add(*y)
            .map(Value::Long)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Quantity(x), Value::Quantity(y)) => x
            .add(y)
            .map(Value::Quantity)
            .map_err(|_| EvalError::TypeMismatch { op: op_name.into(), expected: "compatible units".into(), actual: b.kind() }),
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}"))),
        (Value::Date(date), Value::Quantity(q)) => crate::operators::temporal::add_quantity_to_date(*date, q).map(Value::Date),
        (Value::Quantity(q), Value::Date(date)) => crate::operators::temporal::add_quantity_to_date(*date, q).map(Value::Date),
        (Value::DateTime(dt), Value::Quantity(q)) => crate::operators::temporal::add_quantity_to_datetime(*dt, q).map(Value::DateTime),
        (Value::Quantity(q), Value::DateTime(dt)) => crate::operators::temporal::add_quantity_to_datetime(*dt, q).map(Value::DateTime),
        _ => Ok(Value::Decimal(to_decimal(a) + to_decimal(b))),
    }
}

pub fn subtract(a: &Value, b: &Value, op_name: &str) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x
            .checked_sub(*y)
            .map(Value::Integer)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Long(x), Value::Long(y)) => x
            .checked_sub(*y)
            .map(Value::Long)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Quantity(x), Value::Quantity(y)) => x
            .subtract(y)
            .map(Value::Quantity)
            .map_err(|_| EvalError::TypeMismatch { op: op_name.into(), expected: "compatible units".into(), actual: b.kind() }),
        (Value::Date(date), Value::Quantity(q)) => crate::operators::temporal::subtract_quantity_from_date(*date, q).map(Value::Date),
        (Value::DateTime(dt), Value::Quantity(q)) => crate::operators::temporal::subtract_quantity_from_datetime(*dt, q).map(Value::DateTime),
        _ => Ok(Value::Decimal(to_decimal(a) - to_decimal(b))),
    }
}

pub fn multiply(a: &Value, b: &Value, op_name: &str) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x
            .checked_mul(*y)
            .map(Value::Integer)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Long(x), Value::Long(y)) => x
            .checked_mul(*y)
            .map(Value::Long)
            .ok_or_else(|| EvalError::Overflow { op: op_name.into() }),
        (Value::Quantity(x), Value::Quantity(y)) => Ok(Value::Quantity(x.multiply(y))),
        (Value::Quantity(x), _) => Ok(Value::Quantity(x.multiply_scalar(to_decimal(b)))),
        (_, Value::Quantity(y)) => Ok(Value::Quantity(y.multiply_scalar(to_decimal(a)))),
        _ => Ok(Value::Decimal(to_decimal(a) * to_decimal(b))),
    }
}

pub fn divide(a: &Value, b: &Value) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Quantity(x), Value::Quantity(y)) => x.divide(y).map(Value::Quantity).ok_or(EvalError::DivisionByZero),
        (Value::Quantity(x), _) => {
            let scalar = to_decimal(b);
            x.divide_scalar(scalar).map(Value::Quantity).ok_or(EvalError::DivisionByZero)
        }
        _ => {
            let denom = to_decimal(b);
            if denom.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Decimal(to_decimal(a) / denom))
        }
    }
}

pub fn truncated_divide(a: &Value, b: &Value) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if *y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Integer(x / y))
        }
        (Value::Long(x), Value::Long(y)) => {
            if *y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Long(x / y))
        }
        _ => {
            let denom = to_decimal(b);
            if denom.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Decimal((to_decimal(a) / denom).trunc()))
        }
    }
}

pub fn modulo(a: &Value, b: &Value) -> EvalResult<Value> {
    if null_propagates(a, b) {
        return Ok(Value::Null);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if *y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Integer(x % y))
        }
        (Value::Long(x), Value::Long(y)) => {
            if *y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Long(x % y))
        }
        _ => {
            let denom = to_decimal(b);
            if denom.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Decimal(to_decimal(a) % denom))
        }
    }
}

pub fn power(a: &Value, b: &Value) -> EvalResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) if *y >= 0 => u32::try_from(*y)
            .ok()
            .and_then(|exp| x.checked_pow(exp))
            .map(Value::Integer)
            .ok_or(EvalError::Overflow { op: "Power".into() }),
        _ => {
            let base = to_decimal(a).to_f64().unwrap_or(0.0);
            let exp = to_decimal(b).to_f64().unwrap_or(0.0);
            Decimal::try_from(base.powf(exp)).map(Value::Decimal).map_err(|_| EvalError::Overflow { op: "Power".into() })
        }
    }
}

pub fn negate(a: &Value) -> EvalResult<Value> {
    match a {
        Value::Integer(x) => x.checked_neg().map(Value::Integer).ok_or(EvalError::Overflow { op: "Negate".into() }),
        Value::Long(x) => x.checked_neg().map(Value::Long).ok_or(EvalError::Overflow { op: "Negate".into() }),
        Value::Decimal(x) => Ok(Value::Decimal(-x)),
        Value::Quantity(q) => Ok(Value::Quantity(Quantity::new(-q.value, q.unit.clone()))),
        _ => Err(EvalError::TypeMismatch { op: "Negate".into(), expected: "numeric".into(), actual: a.kind() }),
    }
}

pub fn predecessor(a: &Value) -> EvalResult<Value> {
    match a {
        Value::Integer(x) => x.checked_sub(1).map(Value::Integer).ok_or(EvalError::Overflow { op: "Predecessor".into() }),
        Value::Long(x) => x.checked_sub(1).map(Value::Long).ok_or(EvalError::Overflow { op: "Predecessor".into() }),
        Value::Decimal(x) => Ok(Value::Decimal(x - Decimal::new(1, CONVERSION_SCALE))),
        _ => Err(EvalError::TypeMismatch { op: "Predecessor".into(), expected: "numeric".into(), actual: a.kind() }),
    }
}

pub fn successor(a: &Value) -> EvalResult<Value> {
    match a {
        Value::Integer(x) => x.checked_add(1).map(Value::Integer).ok_or(EvalError::Overflow { op: "Successor".into() }),
        Value::Long(x) => x.checked_add(1).map(Value::Long).ok_or(EvalError::Overflow { op: "Successor".into() }),
        Value::Decimal(x) => Ok(Value::Decimal(x + Decimal::new(1, CONVERSION_SCALE))),
        _ => Err(EvalError::TypeMismatch { op: "Successor".into(), expected: "numeric".into(), actual: a.kind() }),
    }
}

pub fn abs(a: &Value) -> EvalResult<Value> {
    match a {
        Value::Integer(x) => Ok(Value::Integer(x.abs())),
        Value::Long(x) => Ok(Value::Long(x.abs())),
        Value::Decimal(x) => Ok(Value::Decimal(x.abs())),
        Value::Quantity(q) => Ok(Value::Quantity(Quantity::new(q.value.abs(), q.unit.clone()))),
        _ => Err(EvalError::TypeMismatch { op: "Abs".into(), expected: "numeric".into(), actual: a.kind() }),
    }
}

pub fn ceiling(a: &Value) -> EvalResult<Value> {
    Ok(Value::Integer(to_decimal(a).ceil().to_i64().unwrap_or(0)))
}

pub fn floor(a: &Value) -> EvalResult<Value> {
    Ok(Value::Integer(to_decimal(a).floor().to_i64().unwrap_or(0)))
}

pub fn round(a: &Value) -> EvalResult<Value> {
    Ok(Value::Decimal(to_decimal(a).round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)))
}

pub fn truncate(a: &Value) -> EvalResult<Value> {
    Ok(Value::Integer(to_decimal(a).trunc().to_i64().unwrap_or(0)))
}

pub fn sqrt(a: &Value) -> EvalResult<Value> {
    let f = to_decimal(a).to_f64().unwrap_or(0.0);
    if f < 0.0 {
        return Ok(Value::Null);
    }
    Decimal::try_from(f.sqrt()).map(Value::Decimal).map_err(|_| EvalError::Overflow { op: "Sqrt".into() })
}

pub fn ln(a: &Value) -> EvalResult<Value> {
    let f = to_decimal(a).to_f64().unwrap_or(0.0);
    if f <= 0.0 {
        return Ok(Value::Null);
    }
    Decimal::try_from(f.ln()).map(Value::Decimal).map_err(|_| EvalError::Overflow { op: "Ln".into() })
}

pub fn log(a: &Value, base: &Value) -> EvalResult<Value> {
    let f = to_decimal(a).to_f64().unwrap_or(0.0);
    let b = to_decimal(base).to_f64().unwrap_or(0.0);
    if f <= 0.0 || b <= 0.0 || b == 1.0 {
        return Ok(Value::Null);
    }
    Decimal::try_from(f.log(b)).map(Value::Decimal).map_err(|_| EvalError::Overflow { op: "Log".into() })
}

pub fn exp(a: &Value) -> EvalResult<Value> {
    let f = to_decimal(a).to_f64().unwrap_or(0.0);
    Decimal::try_from(f.exp()).map(Value::Decimal).map_err(|_| EvalError::Overflow { op: "Exp".into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_overflow_is_reported() {
        let result = add(&Value::Integer(i64::MAX), &Value::Integer(1), "Add");
        assert!(matches!(result, Err(EvalError::Overflow { .. })));
    }

    #[test]
    fn integer_division_widens_to_decimal() {
        let result = divide(&Value::Integer(7), &Value::Integer(2)).unwrap();
        assert_eq!(result, Value::Decimal(Decimal::new(35, 1)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(divide(&Value::Integer(1), &Value::Integer(0)), Err(EvalError::DivisionByZero)));
    }

    #[test]
    fn null_operand_propagates_instead_of_dividing_by_zero() {
        assert_eq!(divide(&Value::Null, &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn null_operand_propagates_through_add() {
        assert_eq!(add(&Value::Integer(1), &Value::Null, "Add").unwrap(), Value::Null);
    }

    #[test]
    fn ceiling_and_floor_bracket_a_decimal() {
        let d = Value::Decimal(Decimal::new(15, 1));
        assert_eq!(ceiling(&d).unwrap(), Value::Integer(2));
        assert_eq!(floor(&d).unwrap(), Value::Integer(1));
    }
}
