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

//! List-producing and list-querying operators. Every operand here goes
//! through [`Value::as_list`] first, so a bare scalar and a `Null` are
//! both accepted the way CQL's collection-null semantics require:
//! `Null` behaves like `{}`, a scalar behaves like a singleton list.

use octofhir_cql_core::Value;

pub fn union(a: &Value, b: &Value) -> Value {
    let mut result = a.as_list();
    for item in b.as_list() {
        if !result.iter().any(|x| x.equal(&item) == Some(true)) {
            result.push(item);
        }
    }
    Value::List(result)
}

pub fn intersect(a: &Value, b: &Value) -> Value {
    let bl = b.as_list();
    let result: Vec<Value> = a
        .as_list()
        .into_iter()
        .filter(|x| bl.iter().any(|y| x.equal(y) == Some(true)))
        .collect();
    Value::List(dedup(result))
}

pub fn except(a: &Value, b: &Value) -> Value {
    let bl = b.as_list();
    let result: Vec<Value> = a
        .as_list()
        .into_iter()
        .filter(|x| !bl.iter().any(|y| x.equal(y) == Some(true)))
        .collect();
    Value::List(result)
}

fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();
    for item in items {
        if !result.iter().any(|x| x.equal(&item) == Some(true)) {
            result.push(item);
        }
    }
    result
}

pub fn distinct(a: &Value) -> Value {
    Value::List(dedup(a.as_list()))
}

pub fn is_distinct(a: &Value) -> Value {
    let list = a.as_list();
    Value::Boolean(dedup(list.clone()).len() == list.len())
}

pub fn flatten(a: &Value) -> Value {
    fn collect(v: &Value, out: &mut Vec<Value>) {
        match v {
            Value::List(items) => {
                for item in items {
                    collect(item, out);
                }
            }
            Value::Null => {}
            other => out.push(other.clone()),
        }
    }
    let mut out = Vec::new();
    collect(a, &mut out);
    Value::List(out)
}

pub fn first(a: &Value) -> Value {
    a.as_list().into_iter().next().unwrap_or(Value::Null)
}

pub fn last(a: &Value) -> Value {
    a.as_list().into_iter().last().unwrap_or(Value::Null)
}

pub fn tail(a: &Value) -> Value {
    let list = a.as_list();
    if list.is_empty() {
        Value::List(Vec::new())
    } else {
        Value::List(list[1..].to_vec())
    }
}

pub fn skip(a: &Value, n: i64) -> Value {
    let list = a.as_list();
    let n = n.max(0) as usize;
    Value::List(list.into_iter().skip(n).collect())
}

pub fn take(a: &Value, n: i64) -> Value {
    let list = a.as_list();
    let n = n.max(0) as usize;
    Value::List(list.into_iter().take(n).collect())
}

pub fn single(a: &Value) -> Value {
    let list = a.as_list();
    if list.len() == 1 {
        list.into_iter().next().unwrap()
    } else {
        Value::Null
    }
}

pub fn count(a: &Value) -> Value {
    Value::Integer(a.as_list().len() as i64)
}

pub fn exists(a: &Value) -> Value {
    Value::Boolean(!a.as_list().is_empty())
}

pub fn contains(a: &Value, item: &Value) -> Value {
    Value::Boolean(a.as_list().iter().any(|x| x.equal(item) == Some(true)))
}

pub fn in_list(item: &Value, list: &Value) -> Value {
    contains(list, item)
}

pub fn subset_of(a: &Value, b: &Value) -> Value {
    let bl = b.as_list();
    Value::Boolean(a.as_list().iter().all(|x| bl.iter().any(|y| x.equal(y) == Some(true))))
}

pub fn superset_of(a: &Value, b: &Value) -> Value {
    subset_of(b, a)
}

pub fn combine(a: &Value, separator: Option<&str>) -> Value {
    let list = a.as_list();
    let sep = separator.unwrap_or("");
    let mut parts = Vec::new();
    for item in &list {
        match item {
            Value::String(s) => parts.push(s.clone()),
            Value::Null => return Value::Null,
            other => parts.push(other.to_string()),
        }
    }
    Value::String(parts.join(sep))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_deduplicates_across_both_operands() {
        let a = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::List(vec![Value::Integer(2), Value::Integer(3)]);
        assert_eq!(union(&a, &b), Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]));
    }

    #[test]
    fn null_behaves_as_empty_list_for_count() {
        assert_eq!(count(&Value::Null), Value::Integer(0));
    }

    #[test]
    fn single_rejects_multi_element_lists() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(single(&list), Value::Null);
    }

    #[test]
    fn flatten_recurses_through_nested_lists() {
        let nested = Value::List(vec![Value::List(vec![Value::Integer(1)]), Value::Integer(2)]);
        assert_eq!(flatten(&nested), Value::List(vec![Value::Integer(1), Value::Integer(2)]));
    }
}
