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

//! The runtime [`Value`] type: a tagged variant for every value FHIRPath and
//! CQL expressions can produce, plus the three-valued equality, equivalence
//! and ordering operators defined over it.
//!
//! A missing value is `Value::Null`, never Rust's absence-of-value — every
//! operator is total over `Value`, it just may answer `Null`.

use crate::interval::Interval;
use crate::quantity::{Quantity, Ratio};
use crate::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// A single `system`/`code` pair, optionally versioned and displayed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Code {
    pub system: String,
    pub code: String,
    pub version: Option<String>,
    pub display: Option<String>,
}

impl Code {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            version: None,
            display: None,
        }
    }
}

/// A concept: optional free text plus one or more codings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Concept {
    pub text: Option<String>,
    pub coding: Vec<Code>,
}

/// An insertion-ordered name → value map (CQL tuple literal, ELM `Tuple`).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tuple {
    pub fields: IndexMap<String, Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// The kind discriminant of a [`Value`], a cheap `Copy` tag used by the
/// operator registry for overload dispatch without matching the full
/// payload (mirrors upstream's `ExpressionType` fast-enum pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Integer,
    Long,
    Decimal,
    String,
    Date,
    DateTime,
    Time,
    Quantity,
    Ratio,
    Code,
    Concept,
    Interval,
    Tuple,
    List,
    Resource,
}

/// The runtime value type. See module docs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Long(i128),
    Decimal(Decimal),
    String(String),
    Date(PrecisionDate),
    DateTime(PrecisionDateTime),
    Time(PrecisionTime),
    Quantity(Quantity),
    Ratio(Ratio),
    Code(Code),
    Concept(Concept),
    Interval(Box<Interval>),
    Tuple(Tuple),
    List(Vec<Value>),
    /// A FHIR resource (or any FHIR-shaped complex value) as a tree, owned
    /// opaquely by the navigator; the core treats it as inert data.
    Resource(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Long(_) => Kind::Long,
            Value::Decimal(_) => Kind::Decimal,
            Value::String(_) => Kind::String,
            Value::Date(_) => Kind::Date,
            Value::DateTime(_) => Kind::DateTime,
            Value::Time(_) => Kind::Time,
            Value::Quantity(_) => Kind::Quantity,
            Value::Ratio(_) => Kind::Ratio,
            Value::Code(_) => Kind::Code,
            Value::Concept(_) => Kind::Concept,
            Value::Interval(_) => Kind::Interval,
            Value::Tuple(_) => Kind::Tuple,
            Value::List(_) => Kind::List,
            Value::Resource(_) => Kind::Resource,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Collection-null semantics: `Null` behaves as the empty list wherever
    /// it appears as a collection operand.
    pub fn as_list(&self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    pub fn boolean(self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(b),
            Value::Null => None,
            _ => None,
        }
    }

    /// Strict structural equality, the `=` operator. Propagating null
    /// policy: either side `Null` yields `Null` (represented as `None`),
    /// otherwise a definite `Some(bool)`.
    pub fn equal(&self, other: &Value) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::Integer(a), Value::Integer(b)) => Some(a == b),
            (Value::Long(a), Value::Long(b)) => Some(a == b),
            (Value::Integer(a), Value::Long(b)) => Some(*a as i128 == *b),
            (Value::Long(a), Value::Integer(b)) => Some(*a == *b as i128),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a == b),
            (Value::Integer(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Integer(a)) => {
                Some(Decimal::from(*a) == *b)
            }
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::Date(a), Value::Date(b)) => a.compare(b).map(|o| o == Ordering::Equal),
            (Value::DateTime(a), Value::DateTime(b)) => a.compare(b).map(|o| o == Ordering::Equal),
            (Value::Time(a), Value::Time(b)) => a.compare(b).map(|o| o == Ordering::Equal),
            (Value::Quantity(a), Value::Quantity(b)) => a.equals_with_conversion(b).ok(),
            (Value::Code(a), Value::Code(b)) => Some(a == b),
            (Value::Concept(a), Value::Concept(b)) => Some(a == b),
            (Value::Tuple(a), Value::Tuple(b)) => Some(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.equal(y) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            (Value::Interval(a), Value::Interval(b)) => Some(a == b),
            _ => None,
        }
    }

    /// `~` equivalence: case-insensitive strings, precision-lenient
    /// temporals, `Null ~ Null = true`, never `Null` itself.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (Value::Date(a), Value::Date(b)) => equivalent_precision(a.compare(b)),
            (Value::DateTime(a), Value::DateTime(b)) => equivalent_precision(a.compare(b)),
            (Value::Time(a), Value::Time(b)) => equivalent_precision(a.compare(b)),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Value::Quantity(a), Value::Quantity(b)) => a.equals_with_conversion(b).unwrap_or(false),
            _ => self.equal(other).unwrap_or(false),
        }
    }

    /// Total ordering on like kinds; `None` means "incomparable at this
    /// precision" (temporals) rather than an error. Cross-kind comparisons
    /// are a [`crate::error::CoreError::TypeMismatch`] the caller should
    /// raise — this function only handles the value-level logic.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>, crate::error::CoreError> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Some(a.cmp(b))),
            (Value::Long(a), Value::Long(b)) => Ok(Some(a.cmp(b))),
            (Value::Decimal(a), Value::Decimal(b)) => Ok(Some(a.cmp(b))),
            (Value::Integer(a), Value::Decimal(b)) => Ok(Some(Decimal::from(*a).cmp(b))),
            (Value::Decimal(a), Value::Integer(b)) => Ok(Some(a.cmp(&Decimal::from(*b)))),
            (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
            (Value::Date(a), Value::Date(b)) => Ok(a.compare(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Ok(a.compare(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.compare(b)),
            (Value::Quantity(a), Value::Quantity(b)) => {
                if !a.has_compatible_dimensions(b) {
                    return Err(crate::error::CoreError::incompatible_units(
                        a.unit.clone().unwrap_or_else(|| "1".into()),
                        b.unit.clone().unwrap_or_else(|| "1".into()),
                    ));
                }
                let converted = b.convert_to(a.unit.as_deref().unwrap_or("1"))?;
                Ok(Some(a.value.cmp(&converted.value)))
            }
            _ => Err(crate::error::CoreError::type_mismatch(
                "compare",
                format!("{:?}", self.kind()),
                format!("{:?}", other.kind()),
            )),
        }
    }
}

fn equivalent_precision(cmp: Option<Ordering>) -> bool {
    matches!(cmp, Some(Ordering::Equal))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "{{}}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Date(d) => write!(f, "@{d}"),
            Value::DateTime(dt) => write!(f, "@{dt}"),
            Value::Time(t) => write!(f, "@T{t}"),
            Value::Quantity(q) => write!(f, "{q}"),
            Value::Ratio(r) => write!(f, "{r}"),
            Value::Code(c) => write!(f, "Code{{{}:{}}}", c.system, c.code),
            Value::Concept(c) => write!(f, "Concept{{{:?}}}", c.text),
            Value::Interval(i) => write!(f, "{i}"),
            Value::Tuple(_) => write!(f, "Tuple{{...}}"),
            Value::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Resource(_) => write!(f, "Resource{{...}}"),
        }
    }
}

/// Kleene three-valued truth tables. `None` means "unknown" (`Null`).
pub mod kleene {
    pub fn and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
        match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }
    }

    pub fn or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
        match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        }
    }

    pub fn xor(a: Option<bool>, b: Option<bool>) -> Option<bool> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a != b),
            _ => None,
        }
    }

    pub fn not(a: Option<bool>) -> Option<bool> {
        a.map(|v| !v)
    }

    pub fn implies(a: Option<bool>, b: Option<bool>) -> Option<bool> {
        match (a, b) {
            (Some(false), _) => Some(true),
            (_, Some(true)) => Some(true),
            (Some(true), Some(false)) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const T: Option<bool> = Some(true);
    const F: Option<bool> = Some(false);
    const N: Option<bool> = None;

    #[rstest]
    #[case(T, T, T)]
    #[case(T, F, F)]
    #[case(T, N, N)]
    #[case(F, T, F)]
    #[case(F, F, F)]
    #[case(F, N, F)]
    #[case(N, T, N)]
    #[case(N, F, F)]
    #[case(N, N, N)]
    fn and_truth_table(#[case] a: Option<bool>, #[case] b: Option<bool>, #[case] expected: Option<bool>) {
        assert_eq!(kleene::and(a, b), expected);
    }

    #[rstest]
    #[case(T, T, T)]
    #[case(T, F, T)]
    #[case(T, N, T)]
    #[case(F, T, T)]
    #[case(F, F, F)]
    #[case(F, N, N)]
    #[case(N, T, T)]
    #[case(N, F, N)]
    #[case(N, N, N)]
    fn or_truth_table(#[case] a: Option<bool>, #[case] b: Option<bool>, #[case] expected: Option<bool>) {
        assert_eq!(kleene::or(a, b), expected);
    }

    #[test]
    fn null_propagates_through_equality() {
        assert_eq!(Value::Null.equal(&Value::Integer(1)), None);
    }

    #[test]
    fn null_equivalent_to_null() {
        assert!(Value::Null.equivalent(&Value::Null));
    }

    #[test]
    fn incompatible_precision_equality_is_null() {
        let a = Value::Date(PrecisionDate::year_month(2024, 1));
        let b = Value::Date(PrecisionDate::full(2024, 1, 15));
        assert_eq!(a.equal(&b), None);
    }
}
