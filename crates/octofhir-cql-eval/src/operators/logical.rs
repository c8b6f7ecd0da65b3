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

//! Kleene three-valued logic, delegating to [`octofhir_cql_core::kleene`].
//! The tree-walker short-circuits `And`/`Or` before the second operand is
//! even evaluated when the first already settles the answer — this
//! module only implements the truth table itself, the
//! short-circuit lives in [`crate::eval`].

use octofhir_cql_core::{kleene, Value};

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}

pub fn and(a: &Value, b: &Value) -> Value {
    from_option(kleene::and(as_bool(a), as_bool(b)))
}

pub fn or(a: &Value, b: &Value) -> Value {
    from_option(kleene::or(as_bool(a), as_bool(b)))
}

pub fn xor(a: &Value, b: &Value) -> Value {
    from_option(kleene::xor(as_bool(a), as_bool(b)))
}

pub fn not(a: &Value) -> Value {
    from_option(kleene::not(as_bool(a)))
}

pub fn implies(a: &Value, b: &Value) -> Value {
    from_option(kleene::implies(as_bool(a), as_bool(b)))
}

fn from_option(r: Option<bool>) -> Value {
    match r {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_short_circuits_to_false_with_one_false_operand() {
        assert_eq!(and(&Value::Boolean(false), &Value::Null), Value::Boolean(false));
    }

    #[test]
    fn and_with_true_and_null_is_null() {
        assert_eq!(and(&Value::Boolean(true), &Value::Null), Value::Null);
    }

    #[test]
    fn or_with_true_and_null_is_true() {
        assert_eq!(or(&Value::Boolean(true), &Value::Null), Value::Boolean(true));
    }
}
