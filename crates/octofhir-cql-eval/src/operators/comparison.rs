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

//! Equality, equivalence, and ordering. [`Value::equal`]/[`Value::compare`]
//! already carry the three-valued logic; this module just turns their
//! `Option<bool>`/`Option<Ordering>` answers into the `Value::Boolean` or
//! `Value::Null` the tree-walker returns.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::Value;
use std::cmp::Ordering;

fn bool_or_null(result: Option<bool>) -> Value {
    match result {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    }
}

pub fn equal(a: &Value, b: &Value) -> Value {
    bool_or_null(a.equal(b))
}

pub fn not_equal(a: &Value, b: &Value) -> Value {
    bool_or_null(a.equal(b).map(|r| !r))
}

pub fn equivalent(a: &Value, b: &Value) -> Value {
    Value::Boolean(a.equivalent(b))
}

pub fn not_equivalent(a: &Value, b: &Value) -> Value {
    Value::Boolean(!a.equivalent(b))
}

fn ordering(a: &Value, b: &Value, op: &str) -> EvalResult<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    a.compare(b).map_err(|_| EvalError::TypeMismatch {
        op: op.into(),
        expected: format!("{:?}", a.kind()),
        actual: b.kind(),
    })
}

pub fn less(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(bool_or_null(ordering(a, b, "Less")?.map(|o| o == Ordering::Less)))
}

pub fn greater(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(bool_or_null(ordering(a, b, "Greater")?.map(|o| o == Ordering::Greater)))
}

pub fn less_or_equal(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(bool_or_null(ordering(a, b, "LessOrEqual")?.map(|o| o != Ordering::Greater)))
}

pub fn greater_or_equal(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(bool_or_null(ordering(a, b, "GreaterOrEqual")?.map(|o| o != Ordering::Less)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_is_null_when_either_side_is_null() {
        assert_eq!(equal(&Value::Null, &Value::Integer(1)), Value::Null);
    }

    #[test]
    fn less_orders_integers() {
        assert_eq!(less(&Value::Integer(1), &Value::Integer(2)).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn equivalent_is_never_null() {
        assert_eq!(equivalent(&Value::Null, &Value::Null), Value::Boolean(true));
    }
}
