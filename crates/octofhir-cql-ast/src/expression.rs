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

//! Expression node definitions shared by FHIRPath and CQL parsing.

use crate::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;

/// AST representation of a FHIRPath or CQL expression.
///
/// Frequently used variants are placed first; large variants are boxed
/// to keep the overall enum small.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExpressionNode {
    /// Literal value.
    Literal(LiteralValue),

    /// Bare identifier (property name, unqualified reference).
    Identifier(String),

    /// Qualified reference (`LibraryAlias.Name`).
    QualifiedIdentifier { qualifier: String, name: String },

    /// `object.property` path navigation.
    Path { base: Box<ExpressionNode>, path: String },

    /// Binary operation (boxed to keep the enum small).
    BinaryOp(Box<BinaryOpData>),

    /// Unary operation.
    UnaryOp { op: UnaryOperator, operand: Box<ExpressionNode> },

    /// Function call, positional and/or named arguments.
    FunctionCall(Box<FunctionCallData>),

    /// Method call on a base expression (`base.method(args)`).
    MethodCall(Box<MethodCallData>),

    /// Indexed access (`collection[index]`).
    Index { base: Box<ExpressionNode>, index: Box<ExpressionNode> },

    /// `is Type` type check.
    TypeCheck { expression: Box<ExpressionNode>, type_name: String },

    /// `as Type` type cast.
    TypeCast { expression: Box<ExpressionNode>, type_name: String },

    /// Lambda body for functions like `where`/`select` (params bind to
    /// `$this`/`$index` inside `body`).
    Lambda(Box<LambdaData>),

    /// `if cond then a else b`.
    Conditional(Box<ConditionalData>),

    /// `case [selector] when w1 then t1 ... else e end`.
    Case(Box<CaseData>),

    /// `$this`, `$index`, `$total`, or a CQL local variable reference.
    Variable(String),

    /// CQL parameter reference.
    ParameterRef(String),

    /// Tuple literal (`Tuple { a: 1, b: 2 }`).
    TupleLiteral(Vec<(String, ExpressionNode)>),

    /// List literal (`{1, 2, 3}` or `List<Integer> { 1, 2 }`).
    ListLiteral { element_type: Option<String>, elements: Vec<ExpressionNode> },

    /// Interval literal (`Interval[low, high]`).
    IntervalLiteral(Box<IntervalLiteralData>),

    /// `[ResourceType: valueset]` retrieve.
    Retrieve(Box<RetrieveData>),

    /// CQL query (`from ... with ... where ... return ... sort by ...`).
    Query(Box<QueryData>),

    /// Unary `exists(expr)` / `not exists` form kept distinct from a plain
    /// function call so lowering can special-case its null policy.
    Exists(Box<ExpressionNode>),
}

/// Binary operation operands.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryOpData {
    pub op: BinaryOperator,
    pub left: ExpressionNode,
    pub right: ExpressionNode,
}

/// A single positional-or-named function argument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Argument {
    /// `Some(name)` for CQL named arguments; `None` for positional ones.
    pub name: Option<String>,
    pub value: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionCallData {
    pub name: String,
    pub args: SmallVec<[Argument; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodCallData {
    pub base: ExpressionNode,
    pub method: String,
    pub args: SmallVec<[Argument; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LambdaData {
    pub params: SmallVec<[String; 2]>,
    pub body: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionalData {
    pub condition: ExpressionNode,
    pub then_expr: ExpressionNode,
    pub else_expr: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseItem {
    pub when: ExpressionNode,
    pub then: ExpressionNode,
}

/// `case` with an optional selector (comparand); when absent, each `when`
/// clause is a standalone boolean condition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseData {
    pub selector: Option<ExpressionNode>,
    pub items: Vec<CaseItem>,
    pub else_expr: ExpressionNode,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalLiteralData {
    pub low: ExpressionNode,
    pub high: ExpressionNode,
    pub low_closed: bool,
    pub high_closed: bool,
}

/// `[ResourceType: "valuesetOrCodeAlias"]`, with an optional date range
/// filter (`[Type: "vs"] during "period"` is lowered separately via Query).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetrieveData {
    pub resource_type: String,
    pub code_filter: Option<ExpressionNode>,
    pub code_path: Option<String>,
}

/// A single `from` source in a CQL query, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuerySource {
    pub alias: String,
    pub expression: ExpressionNode,
}

/// A `with`/`without` relationship clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationshipClause {
    pub negate: bool,
    pub source: QuerySource,
    pub condition: ExpressionNode,
}

/// A `let` binding inside a query definition clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LetClause {
    pub name: String,
    pub expression: ExpressionNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortItem {
    pub expression: ExpressionNode,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryData {
    pub sources: Vec<QuerySource>,
    pub relationships: Vec<RelationshipClause>,
    pub lets: Vec<LetClause>,
    pub where_clause: Option<ExpressionNode>,
    pub return_clause: Option<ExpressionNode>,
    pub return_distinct: bool,
    pub aggregate_clause: Option<Box<AggregateClause>>,
    pub sort: Vec<SortItem>,
}

/// `aggregate result starting <init>: <body>` clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateClause {
    pub result_alias: String,
    pub starting: Option<ExpressionNode>,
    pub body: ExpressionNode,
}

/// Literal values in FHIRPath/CQL source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LiteralValue {
    Boolean(bool),
    Integer(i64),
    Long(i128),
    /// Stored as string to preserve full decimal precision until lowering.
    Decimal(String),
    String(String),
    Date(String),
    DateTime(String),
    Time(String),
    Quantity { value: String, unit: String },
    Ratio { numerator: (String, String), denominator: (String, String) },
    Null,
}

impl ExpressionNode {
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self::QualifiedIdentifier {
            qualifier: qualifier.into(),
            name: name.into(),
        }
    }

    pub fn path(base: ExpressionNode, path: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            path: path.into(),
        }
    }

    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn function_call(
        name: impl Into<String>,
        args: impl Into<SmallVec<[Argument; 4]>>,
    ) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            name: name.into(),
            args: args.into(),
        }))
    }

    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        args: impl Into<SmallVec<[Argument; 4]>>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            args: args.into(),
        }))
    }

    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn type_check(expression: ExpressionNode, type_name: impl Into<String>) -> Self {
        Self::TypeCheck {
            expression: Box::new(expression),
            type_name: type_name.into(),
        }
    }

    pub fn type_cast(expression: ExpressionNode, type_name: impl Into<String>) -> Self {
        Self::TypeCast {
            expression: Box::new(expression),
            type_name: type_name.into(),
        }
    }

    pub fn lambda(params: impl Into<SmallVec<[String; 2]>>, body: ExpressionNode) -> Self {
        Self::Lambda(Box::new(LambdaData {
            params: params.into(),
            body,
        }))
    }

    pub fn lambda_single(param: impl Into<String>, body: ExpressionNode) -> Self {
        Self::Lambda(Box::new(LambdaData {
            params: smallvec::smallvec![param.into()],
            body,
        }))
    }

    pub fn conditional(
        condition: ExpressionNode,
        then_expr: ExpressionNode,
        else_expr: ExpressionNode,
    ) -> Self {
        Self::Conditional(Box::new(ConditionalData {
            condition,
            then_expr,
            else_expr,
        }))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Cheap structural size estimate, used by the lowering pass to decide
    /// whether constant folding is worth attempting.
    pub fn complexity(&self) -> usize {
        match self {
            Self::Literal(_) | Self::Identifier(_) | Self::Variable(_) | Self::ParameterRef(_) => 1,
            Self::QualifiedIdentifier { .. } => 1,
            Self::Path { base, .. } => 1 + base.complexity(),
            Self::BinaryOp(data) => 1 + data.left.complexity() + data.right.complexity(),
            Self::UnaryOp { operand, .. } => 1 + operand.complexity(),
            Self::FunctionCall(data) => {
                1 + data.args.iter().map(|a| a.value.complexity()).sum::<usize>()
            }
            Self::MethodCall(data) => {
                1 + data.base.complexity()
                    + data.args.iter().map(|a| a.value.complexity()).sum::<usize>()
            }
            Self::Index { base, index } => 1 + base.complexity() + index.complexity(),
            Self::TypeCheck { expression, .. } | Self::TypeCast { expression, .. } => {
                1 + expression.complexity()
            }
            Self::Lambda(data) => 1 + data.body.complexity(),
            Self::Conditional(data) => {
                1 + data.condition.complexity() + data.then_expr.complexity() + data.else_expr.complexity()
            }
            Self::Case(data) => {
                1 + data.selector.as_ref().map_or(0, |s| s.complexity())
                    + data.items.iter().map(|i| i.when.complexity() + i.then.complexity()).sum::<usize>()
                    + data.else_expr.complexity()
            }
            Self::TupleLiteral(fields) => 1 + fields.iter().map(|(_, v)| v.complexity()).sum::<usize>(),
            Self::ListLiteral { elements, .. } => {
                1 + elements.iter().map(|e| e.complexity()).sum::<usize>()
            }
            Self::IntervalLiteral(data) => 1 + data.low.complexity() + data.high.complexity(),
            Self::Retrieve(data) => 1 + data.code_filter.as_ref().map_or(0, |c| c.complexity()),
            Self::Query(data) => {
                1 + data.sources.iter().map(|s| s.expression.complexity()).sum::<usize>()
                    + data.where_clause.as_ref().map_or(0, |w| w.complexity())
            }
            Self::Exists(inner) => 1 + inner.complexity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_wraps_base_in_box() {
        let expr = ExpressionNode::path(ExpressionNode::identifier("Patient"), "name");
        match expr {
            ExpressionNode::Path { base, path } => {
                assert_eq!(*base, ExpressionNode::identifier("Patient"));
                assert_eq!(path, "name");
            }
            _ => panic!("expected Path"),
        }
    }

    #[test]
    fn complexity_counts_every_node() {
        let expr = ExpressionNode::binary_op(
            BinaryOperator::Add,
            ExpressionNode::literal(LiteralValue::Integer(1)),
            ExpressionNode::literal(LiteralValue::Integer(2)),
        );
        assert_eq!(expr.complexity(), 3);
    }
}
