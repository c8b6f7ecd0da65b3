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

//! The static overload table: one entry per [`ElmOperator`], each holding
//! every [`Signature`] the evaluator may dispatch to. This is the dispatch
//! table the tree-walker consults instead of re-deriving argument
//! compatibility by hand at every call site.

use crate::signature::{ParamKind as P, ResultKind as R, Signature};
use octofhir_cql_core::Kind;
use octofhir_cql_elm::ElmOperator;

fn sig(params: &[P], result: R) -> Signature {
    Signature::new(params.to_vec(), result)
}

fn variadic_sig(params: &[P], result: R) -> Signature {
    Signature::variadic(params.to_vec(), result)
}

/// All overloads registered for `op`. Every [`ElmOperator`] variant has at
/// least one entry; operators the parser only ever encodes with a single
/// fixed shape still get one, so overload resolution has a uniform
/// interface regardless of how many shapes exist.
pub fn signatures(op: ElmOperator) -> Vec<Signature> {
    use ElmOperator::*;
    use Kind::*;

    match op {
        // Arithmetic
        Add => vec![
            sig(&[P::Numeric, P::Numeric], R::Widened),
            sig(&[P::Temporal, P::Exact(Quantity)], R::Operand(0)),
            sig(&[P::Exact(Quantity), P::Temporal], R::Operand(1)),
            sig(&[P::Exact(Quantity), P::Exact(Quantity)], R::Fixed(Quantity)),
            sig(&[P::Exact(String), P::Exact(String)], R::Fixed(String)),
        ],
        Subtract => vec![
            sig(&[P::Numeric, P::Numeric], R::Widened),
            sig(&[P::Temporal, P::Exact(Quantity)], R::Operand(0)),
            sig(&[P::Exact(Quantity), P::Exact(Quantity)], R::Fixed(Quantity)),
        ],
        Multiply => vec![
            sig(&[P::Numeric, P::Numeric], R::Widened),
            sig(&[P::Exact(Quantity), P::Numeric], R::Operand(0)),
            sig(&[P::Numeric, P::Exact(Quantity)], R::Operand(1)),
        ],
        Divide => vec![
            sig(&[P::Numeric, P::Numeric], R::Fixed(Decimal)),
            sig(&[P::Exact(Quantity), P::Numeric], R::Operand(0)),
            sig(&[P::Exact(Quantity), P::Exact(Quantity)], R::Fixed(Decimal)),
        ],
        TruncatedDivide => vec![sig(&[P::Numeric, P::Numeric], R::Widened)],
        Modulo => vec![sig(&[P::Numeric, P::Numeric], R::Widened)],
        Power => vec![sig(&[P::Numeric, P::Numeric], R::Widened)],
        Negate => vec![sig(&[P::Numeric], R::Operand(0)), sig(&[P::Exact(Quantity)], R::Operand(0))],
        Predecessor => vec![sig(&[P::Numeric], R::Operand(0)), sig(&[P::Temporal], R::Operand(0))],
        Successor => vec![sig(&[P::Numeric], R::Operand(0)), sig(&[P::Temporal], R::Operand(0))],

        // Comparison
        Equal | NotEqual | Equivalent | NotEquivalent => {
            vec![sig(&[P::Any, P::Any], R::Boolean)]
        }
        Less | Greater | LessOrEqual | GreaterOrEqual => vec![
            sig(&[P::Numeric, P::Numeric], R::Boolean),
            sig(&[P::Exact(Quantity), P::Exact(Quantity)], R::Boolean),
            sig(&[P::Temporal, P::Temporal], R::Boolean),
            sig(&[P::Exact(String), P::Exact(String)], R::Boolean),
        ],

        // Logical (three-valued: `Null` always satisfies `Exact`, see
        // `ParamKind::accepts`)
        And | Or | Xor | Implies => vec![sig(&[P::Exact(Boolean), P::Exact(Boolean)], R::Boolean)],
        Not => vec![sig(&[P::Exact(Boolean)], R::Boolean)],

        // Collection
        Union | Intersect | Except => vec![sig(&[P::List, P::List], R::Operand(0))],
        Distinct | Flatten => vec![sig(&[P::List], R::Operand(0))],
        First | Last | Single => vec![sig(&[P::List], R::Dynamic)],
        Tail => vec![sig(&[P::List], R::Operand(0))],
        Skip | Take => vec![sig(&[P::List, P::Exact(Integer)], R::Operand(0))],
        Count => vec![sig(&[P::List], R::Fixed(Integer))],
        Exists => vec![sig(&[P::List], R::Boolean)],
        In => vec![
            sig(&[P::Any, P::List], R::Boolean),
            sig(&[P::Any, P::Exact(Interval)], R::Boolean),
        ],
        Contains => vec![
            sig(&[P::List, P::Any], R::Boolean),
            sig(&[P::Exact(Interval), P::Any], R::Boolean),
        ],
        SubsetOf | SupersetOf => vec![sig(&[P::List, P::List], R::Boolean)],
        Combine => vec![sig(&[P::List], R::Operand(0))],
        IsDistinct => vec![sig(&[P::List], R::Boolean)],
        Expand => vec![sig(&[P::Any], R::Operand(0))],

        // String
        StartsWith | EndsWith | Matches => {
            vec![sig(&[P::Exact(String), P::Exact(String)], R::Boolean)]
        }
        ReplaceMatches | Replace => vec![sig(
            &[P::Exact(String), P::Exact(String), P::Exact(String)],
            R::Fixed(String),
        )],
        Length => vec![sig(&[P::Exact(String)], R::Fixed(Integer)), sig(&[P::List], R::Fixed(Integer))],
        Substring => vec![
            sig(&[P::Exact(String), P::Exact(Integer)], R::Fixed(String)),
            sig(&[P::Exact(String), P::Exact(Integer), P::Exact(Integer)], R::Fixed(String)),
        ],
        Upper | Lower | Trim => vec![sig(&[P::Exact(String)], R::Fixed(String))],
        Split => vec![sig(&[P::Exact(String), P::Exact(String)], R::Fixed(List))],
        Join => vec![sig(&[P::List, P::Exact(String)], R::Fixed(String))],
        IndexOf => vec![sig(&[P::Exact(String), P::Exact(String)], R::Fixed(Integer))],
        ToChars => vec![sig(&[P::Exact(String)], R::Fixed(List))],
        Encode | Decode => vec![sig(&[P::Exact(String), P::Exact(String)], R::Fixed(String))],
        Concatenate => vec![variadic_sig(&[P::Exact(String)], R::Fixed(String))],

        // Math
        Abs => vec![sig(&[P::Numeric], R::Operand(0)), sig(&[P::Exact(Quantity)], R::Operand(0))],
        Ceiling | Floor | Truncate => vec![sig(&[P::Numeric], R::Fixed(Integer))],
        Round => vec![
            sig(&[P::Exact(Decimal)], R::Fixed(Decimal)),
            sig(&[P::Exact(Decimal), P::Exact(Integer)], R::Fixed(Decimal)),
        ],
        Sqrt | Ln | Exp => vec![sig(&[P::Numeric], R::Fixed(Decimal))],
        Log => vec![sig(&[P::Numeric, P::Numeric], R::Fixed(Decimal))],

        // Temporal
        Today => vec![sig(&[], R::Fixed(Date))],
        Now => vec![sig(&[], R::Fixed(DateTime))],
        TimeOfDay => vec![sig(&[], R::Fixed(Time))],
        DateFrom => vec![sig(&[P::Exact(DateTime)], R::Fixed(Date))],
        TimeFrom => vec![sig(&[P::Exact(DateTime)], R::Fixed(Time))],
        DurationBetween | DifferenceBetween => vec![
            sig(&[P::Temporal, P::Temporal], R::Fixed(Long)),
            sig(&[P::Temporal, P::Temporal, P::Exact(String)], R::Fixed(Long)),
        ],

        // Type
        Is | ConvertsTo => vec![sig(&[P::Any, P::Exact(String)], R::Boolean)],
        As => vec![sig(&[P::Any, P::Exact(String)], R::Operand(0))],
        ToBoolean => vec![sig(&[P::Any], R::Fixed(Boolean))],
        ToDecimal => vec![sig(&[P::Any], R::Fixed(Decimal))],
        ToInteger => vec![sig(&[P::Any], R::Fixed(Integer))],
        ToLong => vec![sig(&[P::Any], R::Fixed(Long))],
        ToString => vec![sig(&[P::Any], R::Fixed(String))],
        ToDate => vec![sig(&[P::Any], R::Fixed(Date))],
        ToDateTime => vec![sig(&[P::Any], R::Fixed(DateTime))],
        ToTime => vec![sig(&[P::Any], R::Fixed(Time))],
        ToQuantity => vec![sig(&[P::Any], R::Fixed(Quantity))],
        ToList => vec![sig(&[P::Any], R::Fixed(List))],

        // Quantity
        ConvertQuantity => vec![sig(&[P::Exact(Quantity), P::Exact(String)], R::Fixed(Quantity))],
        CanConvertQuantity => vec![sig(&[P::Exact(Quantity), P::Exact(String)], R::Boolean)],

        // Interval
        IntervalOverlaps | IntervalDuring | IntervalBefore | IntervalAfter | IntervalStarts
        | IntervalEnds => vec![sig(&[P::Exact(Interval), P::Exact(Interval)], R::Boolean)],
        IntervalWidth => vec![sig(&[P::Exact(Interval)], R::Dynamic)],
        IntervalContains => vec![sig(&[P::Exact(Interval), P::Any], R::Boolean)],
        IntervalIn => vec![sig(&[P::Any, P::Exact(Interval)], R::Boolean)],
        Start | End => vec![sig(&[P::Exact(Interval)], R::Dynamic)],

        // Aggregate
        Sum | Avg | Median | Min | Max | StdDev | Variance | GeometricMean | Product => {
            vec![sig(&[P::List], R::Dynamic)]
        }
        AllTrue | AnyTrue => vec![sig(&[P::List], R::Fixed(Boolean))],

        // Clinical
        AgeInYears | AgeInMonths => vec![
            sig(&[], R::Fixed(Integer)),
            sig(&[P::Temporal], R::Fixed(Integer)),
        ],
        CalculateAgeAt => vec![sig(&[P::Temporal, P::Temporal], R::Fixed(Integer))],

        // Terminology
        InValueSet => vec![sig(&[P::Any, P::Any], R::Boolean)],
        Subsumes | SubsumedBy => vec![sig(&[P::Any, P::Any], R::Boolean)],

        // Null checks
        IsNull => vec![sig(&[P::Any], R::Fixed(Boolean))],
        IsTrue | IsFalse => vec![sig(&[P::Exact(Boolean)], R::Fixed(Boolean))],
        Coalesce => vec![variadic_sig(&[P::Any], R::Dynamic)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operator_has_at_least_one_signature() {
        // a representative sample across every category in the enum, not
        // an exhaustive sweep — `signatures` is an exhaustive match so the
        // compiler already guarantees full coverage.
        for op in [
            ElmOperator::Add,
            ElmOperator::Equal,
            ElmOperator::And,
            ElmOperator::Union,
            ElmOperator::StartsWith,
            ElmOperator::Abs,
            ElmOperator::Today,
            ElmOperator::Is,
            ElmOperator::ConvertQuantity,
            ElmOperator::IntervalOverlaps,
            ElmOperator::Sum,
            ElmOperator::AgeInYears,
            ElmOperator::InValueSet,
            ElmOperator::IsNull,
            ElmOperator::Expand,
        ] {
            assert!(!signatures(op).is_empty(), "{op:?} has no signatures");
        }
    }

    #[test]
    fn add_accepts_numeric_and_date_quantity_shapes() {
        let sigs = signatures(ElmOperator::Add);
        assert!(sigs.iter().any(|s| s.matches(&[Kind::Integer, Kind::Integer])));
        assert!(sigs.iter().any(|s| s.matches(&[Kind::Date, Kind::Quantity])));
        assert!(!sigs.iter().any(|s| s.matches(&[Kind::Boolean, Kind::Boolean])));
    }
}
