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

//! The ELM expression tree: the neutral representation the evaluator
//! walks.
//!
//! Real ELM gives each of its ~150 expression kinds a distinct JSON `type`
//! tag, but the vast majority share one of three shapes: no operand
//! (`Literal`, `ExpressionRef`), one operand (`Not`, `Exists`, `Abs`), or a
//! small fixed list of operands (`Add`, `Between`, `ConvertQuantity`). Rather
//! than one Rust variant per tag, [`ElmNode::Operator`] carries the tag as an
//! [`ElmOperator`] enum plus its operand list; the evaluator's dispatch match
//! is then a match over `ElmOperator`, which is where the "~150 kinds, one
//! evaluator function per kind" contract actually lives.
//! Structural forms that carry their own nested data (`If`, `Case`, `Query`,
//! `Retrieve`, `Tuple`, `List`, `Interval`) keep dedicated variants.

use octofhir_cql_core::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Operator tag for [`ElmNode::Operator`]. Grouped by operator category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElmOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    TruncatedDivide,
    Modulo,
    Power,
    Negate,
    Predecessor,
    Successor,

    // Comparison
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,

    // Logical
    And,
    Or,
    Xor,
    Not,
    Implies,

    // Collection
    Union,
    Intersect,
    Except,
    Distinct,
    Flatten,
    First,
    Last,
    Tail,
    Skip,
    Take,
    Single,
    Count,
    Exists,
    In,
    Contains,
    SubsetOf,
    SupersetOf,
    Combine,
    IsDistinct,
    /// Wraps an [`ElmNode::ExpressionRef`] that crosses from a
    /// population-level context into a per-subject one, so the evaluator
    /// iterates the referenced result once per subject instead of once
    /// total.
    Expand,

    // String
    StartsWith,
    EndsWith,
    Matches,
    ReplaceMatches,
    Replace,
    Length,
    Substring,
    Upper,
    Lower,
    Trim,
    Split,
    Join,
    IndexOf,
    ToChars,
    Encode,
    Decode,
    Concatenate,

    // Math
    Abs,
    Ceiling,
    Floor,
    Round,
    Truncate,
    Sqrt,
    Ln,
    Log,
    Exp,

    // Temporal
    Today,
    Now,
    TimeOfDay,
    DateFrom,
    TimeFrom,
    DurationBetween,
    DifferenceBetween,

    // Type
    Is,
    As,
    ConvertsTo,
    ToBoolean,
    ToDecimal,
    ToInteger,
    ToLong,
    ToString,
    ToDate,
    ToDateTime,
    ToTime,
    ToQuantity,
    ToList,

    // Quantity
    ConvertQuantity,
    CanConvertQuantity,

    // Interval
    IntervalOverlaps,
    IntervalDuring,
    IntervalBefore,
    IntervalAfter,
    IntervalStarts,
    IntervalEnds,
    IntervalWidth,
    IntervalContains,
    IntervalIn,
    Start,
    End,

    // Aggregate
    Sum,
    Avg,
    Median,
    Min,
    Max,
    StdDev,
    Variance,
    GeometricMean,
    Product,
    AllTrue,
    AnyTrue,

    // Clinical
    AgeInYears,
    AgeInMonths,
    CalculateAgeAt,

    // Terminology
    InValueSet,
    Subsumes,
    SubsumedBy,

    // Null checks
    IsNull,
    IsTrue,
    IsFalse,
    Coalesce,
}

/// One `when`/`then` arm of an ELM [`ElmNode::Case`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmCaseItem {
    pub when: ElmNode,
    pub then: ElmNode,
}

/// A `with`/`without` relationship in an [`ElmQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmRelationship {
    pub negate: bool,
    pub alias: String,
    pub source: ElmNode,
    pub condition: ElmNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmLetClause {
    pub name: String,
    pub expression: ElmNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElmSortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmSortItem {
    pub expression: ElmNode,
    pub direction: ElmSortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmAggregateClause {
    pub result_alias: String,
    pub starting: Option<Box<ElmNode>>,
    pub body: Box<ElmNode>,
}

/// A single `alias in source` / `alias from source` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmAliasedSource {
    pub alias: String,
    pub expression: ElmNode,
}

/// Lowered CQL query: source list plus relationship/let/where/return/sort
/// clauses, including the aggregate query extension used by measure definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmQuery {
    pub sources: Vec<ElmAliasedSource>,
    pub relationships: Vec<ElmRelationship>,
    pub lets: Vec<ElmLetClause>,
    pub where_clause: Option<ElmNode>,
    pub return_clause: Option<ElmNode>,
    pub return_distinct: bool,
    pub aggregate: Option<ElmAggregateClause>,
    pub sort: Vec<ElmSortItem>,
}

/// `[ResourceType: codeFilter]` retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElmRetrieve {
    pub resource_type: String,
    pub code_filter: Option<Box<ElmNode>>,
    pub code_path: Option<String>,
    pub date_filter: Option<Box<ElmNode>>,
}

/// The ELM expression tree. See module docs for the `Operator` node design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElmNode {
    /// Constant value, folded or source literal.
    Literal(Value),

    /// Reference to another statement's (or an included library's) result.
    ExpressionRef { name: String, library_name: Option<String> },

    /// Reference to a declared parameter.
    ParameterRef(String),

    /// Reference to a `codesystem` declaration.
    CodeSystemRef(String),

    /// Reference to a `valueset` declaration.
    ValuesetRef(String),

    /// Reference to a `code` declaration.
    CodeRef(String),

    /// Reference to a `concept` declaration.
    ConceptRef(String),

    /// `$this`/`$index`/`$total`/query alias/`let` binding/function argument.
    OperandRef(String),

    /// Property navigation (the actual traversal happens at eval time).
    Property { source: Box<ElmNode>, path: String },

    /// Indexed access into a list.
    Indexer { source: Box<ElmNode>, index: Box<ElmNode> },

    /// Generic operator node; see module docs.
    Operator { op: ElmOperator, operands: SmallVec<[ElmNode; 2]> },

    /// `if condition then a else b`.
    If { condition: Box<ElmNode>, then_branch: Box<ElmNode>, else_branch: Box<ElmNode> },

    /// `case [comparand] when w1 then t1 ... else e end`.
    Case { comparand: Option<Box<ElmNode>>, items: Vec<ElmCaseItem>, else_branch: Box<ElmNode> },

    /// Tuple literal.
    Tuple { elements: Vec<(String, ElmNode)> },

    /// List literal.
    List { element_type: Option<String>, elements: Vec<ElmNode> },

    /// Interval literal.
    Interval {
        low: Box<ElmNode>,
        high: Box<ElmNode>,
        low_closed: bool,
        high_closed: bool,
    },

    /// `[ResourceType: codeFilter]`.
    Retrieve(Box<ElmRetrieve>),

    /// Full query pipeline.
    Query(Box<ElmQuery>),

    /// Call to a CQL-defined (or built-in-by-name) function.
    FunctionRef {
        name: String,
        library_name: Option<String>,
        operands: Vec<ElmNode>,
    },

    /// Declared-but-unimplemented `external` function; rejected at eval time
    /// unless a host registers an implementation (SPEC_FULL.md §4.6).
    ExternalFunctionRef { name: String, operands: Vec<ElmNode> },
}

impl ElmNode {
    pub fn operator(op: ElmOperator, operands: impl Into<SmallVec<[ElmNode; 2]>>) -> Self {
        Self::Operator { op, operands: operands.into() }
    }

    pub fn unary(op: ElmOperator, operand: ElmNode) -> Self {
        Self::Operator { op, operands: smallvec::smallvec![operand] }
    }

    pub fn binary(op: ElmOperator, left: ElmNode, right: ElmNode) -> Self {
        Self::Operator { op, operands: smallvec::smallvec![left, right] }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_operator_has_two_operands() {
        let node = ElmNode::binary(
            ElmOperator::Add,
            ElmNode::Literal(Value::Integer(1)),
            ElmNode::Literal(Value::Integer(2)),
        );
        match node {
            ElmNode::Operator { op, operands } => {
                assert_eq!(op, ElmOperator::Add);
                assert_eq!(operands.len(), 2);
            }
            _ => panic!("expected Operator"),
        }
    }
}
