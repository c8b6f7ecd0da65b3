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

//! Terminology membership/subsumption operators, delegating to
//! [`octofhir_cql_terminology::TerminologyService`], and the null-check
//! family (`IsNull`/`IsTrue`/`IsFalse`/`Coalesce`), which don't need a
//! service at all.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::{Code, Value};
use octofhir_cql_terminology::{SubsumptionRelation, TerminologyService};

fn codes_of(v: &Value) -> Vec<Code> {
    match v {
        Value::Code(c) => vec![c.clone()],
        Value::Concept(c) => c.coding.clone(),
        Value::List(items) => items.iter().flat_map(codes_of).collect(),
        _ => Vec::new(),
    }
}

pub fn in_value_set(code: &Value, url: &Value, terminology: &dyn TerminologyService) -> EvalResult<Value> {
    let url = match url {
        Value::String(s) => s,
        _ => return Err(EvalError::TypeMismatch { op: "InValueSet".into(), expected: "String".into(), actual: url.kind() }),
    };
    let candidates = codes_of(code);
    if candidates.is_empty() {
        return Ok(Value::Boolean(false));
    }
    for candidate in &candidates {
        if terminology.member_of(candidate, url).map_err(|e| EvalError::Terminology { message: e.to_string() })? {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn subsumption(a: &Value, b: &Value, terminology: &dyn TerminologyService, op: &str) -> EvalResult<SubsumptionRelation> {
    let ca = codes_of(a);
    let cb = codes_of(b);
    let (a, b) = match (ca.first(), cb.first()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(EvalError::TypeMismatch { op: op.into(), expected: "Code or Concept".into(), actual: a.kind() }),
    };
    if a.system != b.system {
        return Ok(SubsumptionRelation::NotSubsumed);
    }
    terminology
        .subsumes(&a.system, &a.code, &b.code)
        .map_err(|e| EvalError::Terminology { message: e.to_string() })
}

pub fn subsumes(a: &Value, b: &Value, terminology: &dyn TerminologyService) -> EvalResult<Value> {
    let relation = subsumption(a, b, terminology, "Subsumes")?;
    Ok(Value::Boolean(matches!(relation, SubsumptionRelation::Subsumes | SubsumptionRelation::Equivalent)))
}

pub fn subsumed_by(a: &Value, b: &Value, terminology: &dyn TerminologyService) -> EvalResult<Value> {
    let relation = subsumption(a, b, terminology, "SubsumedBy")?;
    Ok(Value::Boolean(matches!(relation, SubsumptionRelation::SubsumedBy | SubsumptionRelation::Equivalent)))
}

pub fn is_null(a: &Value) -> Value {
    Value::Boolean(a.is_null())
}

pub fn is_true(a: &Value) -> Value {
    Value::Boolean(matches!(a, Value::Boolean(true)))
}

pub fn is_false(a: &Value) -> Value {
    Value::Boolean(matches!(a, Value::Boolean(false)))
}

pub fn coalesce(values: &[Value]) -> Value {
    values.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_terminology::InMemoryTerminologyService;

    #[test]
    fn coalesce_returns_first_non_null() {
        let values = vec![Value::Null, Value::Null, Value::Integer(3)];
        assert_eq!(coalesce(&values), Value::Integer(3));
    }

    #[test]
    fn is_null_distinguishes_null_from_false() {
        assert_eq!(is_null(&Value::Null), Value::Boolean(true));
        assert_eq!(is_null(&Value::Boolean(false)), Value::Boolean(false));
    }

    #[test]
    fn in_value_set_with_no_codes_is_false() {
        let service = InMemoryTerminologyService::default();
        assert_eq!(in_value_set(&Value::Null, &Value::String("urn:vs".into()), &service).unwrap(), Value::Boolean(false));
    }
}
