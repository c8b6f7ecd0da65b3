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

//! Aggregate operators over a list operand. CQL aggregates ignore null
//! elements rather than propagating them (unlike scalar arithmetic), so
//! each function filters nulls out of [`Value::as_list`] first.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::Value;
use rust_decimal::Decimal;
use std::cmp::Ordering;

fn non_null(a: &Value) -> Vec<Value> {
    a.as_list().into_iter().filter(|v| !v.is_null()).collect()
}

fn to_decimal(v: &Value, op: &str) -> EvalResult<Decimal> {
    match v {
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Long(l) => Decimal::try_from(*l).map_err(|_| EvalError::Overflow { op: op.into() }),
        Value::Decimal(d) => Ok(*d),
        _ => Err(EvalError::TypeMismatch { op: op.into(), expected: "numeric".into(), actual: v.kind() }),
    }
}

pub fn sum(a: &Value) -> EvalResult<Value> {
    let items = non_null(a);
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let mut total = Decimal::ZERO;
    for item in &items {
        total += to_decimal(item, "Sum")?;
    }
    Ok(Value::Decimal(total))
}

pub fn avg(a: &Value) -> EvalResult<Value> {
    let items = non_null(a);
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let mut total = Decimal::ZERO;
    for item in &items {
        total += to_decimal(item, "Avg")?;
    }
    Ok(Value::Decimal(total / Decimal::from(items.len())))
}

pub fn product(a: &Value) -> EvalResult<Value> {
    let items = non_null(a);
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let mut total = Decimal::ONE;
    for item in &items {
        total *= to_decimal(item, "Product")?;
    }
    Ok(Value::Decimal(total))
}

fn numeric_sorted(a: &Value, op: &str) -> EvalResult<Vec<Decimal>> {
    let mut values: Vec<Decimal> = non_null(a).iter().map(|v| to_decimal(v, op)).collect::<EvalResult<_>>()?;
    values.sort();
    Ok(values)
}

pub fn median(a: &Value) -> EvalResult<Value> {
    let values = numeric_sorted(a, "Median")?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let mid = values.len() / 2;
    let result = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / Decimal::TWO
    } else {
        values[mid]
    };
    Ok(Value::Decimal(result))
}

pub fn min(a: &Value) -> EvalResult<Value> {
    let items = non_null(a);
    items
        .into_iter()
        .try_fold(None::<Value>, |acc, item| match &acc {
            None => Ok(Some(item)),
            Some(current) => match current.compare(&item) {
                Ok(Some(Ordering::Greater)) => Ok(Some(item)),
                Ok(_) => Ok(acc),
                Err(_) => Err(EvalError::TypeMismatch { op: "Min".into(), expected: "comparable".into(), actual: item.kind() }),
            },
        })
        .map(|v| v.unwrap_or(Value::Null))
}

pub fn max(a: &Value) -> EvalResult<Value> {
    let items = non_null(a);
    items
        .into_iter()
        .try_fold(None::<Value>, |acc, item| match &acc {
            None => Ok(Some(item)),
            Some(current) => match current.compare(&item) {
                Ok(Some(Ordering::Less)) => Ok(Some(item)),
                Ok(_) => Ok(acc),
                Err(_) => Err(EvalError::TypeMismatch { op: "Max".into(), expected: "comparable".into(), actual: item.kind() }),
            },
        })
        .map(|v| v.unwrap_or(Value::Null))
}

fn variance_decimal(a: &Value, op: &str, sample: bool) -> EvalResult<Option<Decimal>> {
    let items = non_null(a);
    let divisor = if sample { items.len().saturating_sub(1) } else { items.len() };
    if items.is_empty() || divisor == 0 {
        return Ok(None);
    }
    let values: Vec<Decimal> = items.iter().map(|v| to_decimal(v, op)).collect::<EvalResult<_>>()?;
    let mean = values.iter().sum::<Decimal>() / Decimal::from(values.len());
    let sum_sq: Decimal = values.iter().map(|v| (*v - mean) * (*v - mean)).sum();
    Ok(Some(sum_sq / Decimal::from(divisor)))
}

pub fn variance(a: &Value) -> EvalResult<Value> {
    Ok(variance_decimal(a, "Variance", true)?.map(Value::Decimal).unwrap_or(Value::Null))
}

pub fn std_dev(a: &Value) -> EvalResult<Value> {
    match variance_decimal(a, "StdDev", true)? {
        Some(var) => {
            let as_f64: f64 = var.try_into().unwrap_or(0.0);
            Decimal::try_from(as_f64.sqrt()).map(Value::Decimal).or(Ok(Value::Null))
        }
        None => Ok(Value::Null),
    }
}

pub fn geometric_mean(a: &Value) -> EvalResult<Value> {
    let values = numeric_sorted(a, "GeometricMean")?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let mut log_sum = 0f64;
    for v in &values {
        let f: f64 = (*v).try_into().unwrap_or(0.0);
        if f <= 0.0 {
            return Ok(Value::Null);
        }
        log_sum += f.ln();
    }
    let mean_log = log_sum / values.len() as f64;
    Decimal::try_from(mean_log.exp()).map(Value::Decimal).or(Ok(Value::Null))
}

pub fn all_true(a: &Value) -> EvalResult<Value> {
    Ok(Value::Boolean(a.as_list().iter().all(|v| matches!(v, Value::Boolean(true)))))
}

pub fn any_true(a: &Value) -> EvalResult<Value> {
    Ok(Value::Boolean(a.as_list().iter().any(|v| matches!(v, Value::Boolean(true)))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: Vec<i64>) -> Value {
        Value::List(values.into_iter().map(Value::Integer).collect())
    }

    #[test]
    fn sum_ignores_null_elements() {
        let values = Value::List(vec![Value::Integer(1), Value::Null, Value::Integer(2)]);
        assert_eq!(sum(&values).unwrap(), Value::Decimal(Decimal::from(3)));
    }

    #[test]
    fn avg_of_empty_list_is_null() {
        assert_eq!(avg(&Value::List(vec![])).unwrap(), Value::Null);
    }

    #[test]
    fn median_of_even_length_list_averages_middle_two() {
        let values = list(vec![1, 2, 3, 4]);
        assert_eq!(median(&values).unwrap(), Value::Decimal(Decimal::new(25, 1)));
    }

    #[test]
    fn min_and_max_compare_elements() {
        let values = list(vec![3, 1, 4, 1, 5]);
        assert_eq!(min(&values).unwrap(), Value::Integer(1));
        assert_eq!(max(&values).unwrap(), Value::Integer(5));
    }
}
