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

//! Type testing (`Is`/`As`), conversion testing (`ConvertsTo*`), and the
//! explicit `To*` conversion functions.

use crate::temporal_literal;
use octofhir_cql_core::{Kind, Quantity, Value};
use rust_decimal::Decimal;
use std::str::FromStr;

fn kind_name_matches(kind: Kind, type_name: &str) -> bool {
    let name = match kind {
        Kind::Null => "Any",
        Kind::Boolean => "Boolean",
        Kind::Integer => "Integer",
        Kind::Long => "Long",
        Kind::Decimal => "Decimal",
        Kind::String => "String",
        Kind::Date => "Date",
        Kind::DateTime => "DateTime",
        Kind::Time => "Time",
        Kind::Quantity => "Quantity",
        Kind::Ratio => "Ratio",
        Kind::Code => "Code",
        Kind::Concept => "Concept",
        Kind::Interval => "Interval",
        Kind::Tuple => "Tuple",
        Kind::List => "List",
        Kind::Resource => "Resource",
    };
    name.eq_ignore_ascii_case(type_name)
}

pub fn is_type(v: &Value, type_name: &str) -> Value {
    if let Value::Resource(json) = v {
        if let Some(rt) = json.get("resourceType").and_then(|t| t.as_str()) {
            return Value::Boolean(rt == type_name);
        }
    }
    Value::Boolean(kind_name_matches(v.kind(), type_name))
}

pub fn as_type(v: &Value, type_name: &str) -> Value {
    if is_type(v, type_name) == Value::Boolean(true) {
        v.clone()
    } else {
        Value::Null
    }
}

pub fn to_boolean(v: &Value) -> Value {
    match v {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Value::Boolean(true),
            "false" | "f" | "no" | "n" | "0" => Value::Boolean(false),
            _ => Value::Null,
        },
        Value::Integer(1) => Value::Boolean(true),
        Value::Integer(0) => Value::Boolean(false),
        _ => Value::Null,
    }
}

pub fn converts_to_boolean(v: &Value) -> Value {
    Value::Boolean(!matches!(to_boolean(v), Value::Null) || matches!(v, Value::Boolean(_)))
}

pub fn to_decimal(v: &Value) -> Value {
    match v {
        Value::Decimal(d) => Value::Decimal(*d),
        Value::Integer(i) => Value::Decimal(Decimal::from(*i)),
        Value::Long(l) => Decimal::try_from(*l).map(Value::Decimal).unwrap_or(Value::Null),
        Value::String(s) => Decimal::from_str(s).map(Value::Decimal).unwrap_or(Value::Null),
        Value::Boolean(true) => Value::Decimal(Decimal::ONE),
        Value::Boolean(false) => Value::Decimal(Decimal::ZERO),
        _ => Value::Null,
    }
}

pub fn converts_to_decimal(v: &Value) -> Value {
    Value::Boolean(!matches!(to_decimal(v), Value::Null) || matches!(v, Value::Null))
}

pub fn to_integer(v: &Value) -> Value {
    match v {
        Value::Integer(i) => Value::Integer(*i),
        Value::Long(l) => i64::try_from(*l).map(Value::Integer).unwrap_or(Value::Null),
        Value::Decimal(d) => d.trunc().to_string().parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
        Value::Boolean(true) => Value::Integer(1),
        Value::Boolean(false) => Value::Integer(0),
        _ => Value::Null,
    }
}

pub fn converts_to_integer(v: &Value) -> Value {
    Value::Boolean(!matches!(to_integer(v), Value::Null) || matches!(v, Value::Null))
}

pub fn to_long(v: &Value) -> Value {
    match v {
        Value::Long(l) => Value::Long(*l),
        Value::Integer(i) => Value::Long(*i as i128),
        Value::String(s) => s.trim().parse::<i128>().map(Value::Long).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub fn to_string(v: &Value) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

pub fn to_date(v: &Value) -> Value {
    match v {
        Value::Date(_) => v.clone(),
        Value::DateTime(dt) => Value::Date(dt.date),
        Value::String(s) => temporal_literal::parse_date(s).map(Value::Date).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub fn to_date_time(v: &Value) -> Value {
    match v {
        Value::DateTime(_) => v.clone(),
        Value::Date(d) => Value::DateTime(octofhir_cql_core::PrecisionDateTime::new(*d, None, None)),
        Value::String(s) => temporal_literal::parse_datetime(s).map(Value::DateTime).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub fn to_time(v: &Value) -> Value {
    match v {
        Value::Time(_) => v.clone(),
        Value::String(s) => temporal_literal::parse_time(s).map(Value::Time).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub fn to_quantity(v: &Value) -> Value {
    match v {
        Value::Quantity(_) => v.clone(),
        Value::Integer(i) => Value::Quantity(Quantity::unitless(Decimal::from(*i))),
        Value::Decimal(d) => Value::Quantity(Quantity::unitless(*d)),
        _ => Value::Null,
    }
}

pub fn to_list(v: &Value) -> Value {
    Value::List(v.as_list())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_type_matches_resource_type_for_resources() {
        let resource = Value::Resource(serde_json::json!({ "resourceType": "Patient" }));
        assert_eq!(is_type(&resource, "Patient"), Value::Boolean(true));
    }

    #[test]
    fn to_boolean_parses_common_string_spellings() {
        assert_eq!(to_boolean(&Value::String("true".into())), Value::Boolean(true));
        assert_eq!(to_boolean(&Value::String("no".into())), Value::Boolean(false));
        assert_eq!(to_boolean(&Value::String("maybe".into())), Value::Null);
    }

    #[test]
    fn to_integer_truncates_decimals() {
        assert_eq!(to_integer(&Value::Decimal(Decimal::new(375, 2))), Value::Integer(3));
    }
}
