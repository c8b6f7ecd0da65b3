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

//! Pass 2: lower a parsed [`LibraryAst`] (using the symbol tables [`collect`]
//! built) into an [`ElmLibrary`].
//!
//! Name resolution, context propagation, and a narrow constant-folding pass
//! all happen here, expression by expression. Lowering never stops at the
//! first unresolved name: unresolvable identifiers become `Literal(Null)`
//! plus a pushed diagnostic, so one bad `define` doesn't block the rest of
//! the library from compiling.

use crate::error::ElmError;
use crate::library::*;
use crate::lower::collect::{collect, DefinitionKind, SymbolTable};
use crate::node::*;
use octofhir_cql_ast::*;
use octofhir_cql_core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use octofhir_cql_core::{kleene, Quantity, Ratio, Value};
use octofhir_cql_diagnostics::Diagnostics;
use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use std::str::FromStr;

/// Context a `define` runs in when the source names none explicitly.
const DEFAULT_CONTEXT: &str = "Patient";
/// The population-level context: its results are shared across every
/// subject rather than recomputed per subject.
const POPULATION_CONTEXT: &str = "Unfiltered";

#[derive(Debug, Clone, Default)]
struct Scope {
    statement_context: String,
    locals: FxHashSet<String>,
}

impl Scope {
    fn for_statement(context: String) -> Self {
        Self { statement_context: context, locals: FxHashSet::default() }
    }
}

/// Lower a full library: collects symbol tables, detects cyclic definitions,
/// then converts every declaration and statement to its ELM form.
pub fn lower_library(library: &LibraryAst) -> (ElmLibrary, Diagnostics) {
    let (table, mut diagnostics) = collect(library);
    detect_definition_cycles(library, &table, &mut diagnostics);

    let mut elm = ElmLibrary::new();
    elm.identifier = library
        .identifier
        .as_ref()
        .map(|id| ElmLibraryIdentifier { id: id.id.clone(), version: id.version.clone() });
    elm.usings = library
        .usings
        .iter()
        .map(|u| ElmUsing { model: u.model.clone(), version: u.version.clone() })
        .collect();
    elm.includes = library
        .includes
        .iter()
        .map(|i| ElmInclude { name: i.name.clone(), version: i.version.clone(), alias: i.alias.clone() })
        .collect();
    elm.code_systems = library
        .code_systems
        .iter()
        .map(|c| ElmCodeSystemDef { name: c.name.clone(), id: c.id.clone(), version: c.version.clone() })
        .collect();
    elm.valuesets = library
        .valuesets
        .iter()
        .map(|v| ElmValuesetDef { name: v.name.clone(), id: v.id.clone(), version: v.version.clone() })
        .collect();
    elm.codes = library
        .codes
        .iter()
        .map(|c| ElmCodeDef { name: c.name.clone(), code: c.code.clone(), system: c.system.clone(), display: c.display.clone() })
        .collect();
    elm.concepts = library
        .concepts
        .iter()
        .map(|c| ElmConceptDef { name: c.name.clone(), codes: c.codes.clone(), display: c.display.clone() })
        .collect();
    elm.contexts = library.contexts.iter().map(|c| ElmContextDef { name: c.name.clone() }).collect();

    let mut lowerer = Lowerer { table: &table, diagnostics: &mut diagnostics };

    for p in &library.parameters {
        let default_scope = Scope::for_statement(DEFAULT_CONTEXT.to_string());
        elm.parameters.push(ElmParameterDef {
            name: p.name.clone(),
            declared_type: p.declared_type.clone(),
            default: p.default.as_ref().map(|d| lowerer.lower_expression(d, &default_scope)),
        });
    }

    for expr_def in &library.expressions {
        let context = expr_def.context.clone().unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
        let scope = Scope::for_statement(context.clone());
        let expression = lowerer.lower_expression(&expr_def.expression, &scope);
        elm.statements.push(ElmStatement {
            name: expr_def.name.clone(),
            context,
            is_public: expr_def.is_public,
            function_params: None,
            expression,
        });
    }

    for func_def in &library.functions {
        let context = func_def.context.clone().unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
        let params: Vec<ElmFunctionParameter> = func_def
            .params
            .iter()
            .map(|p| ElmFunctionParameter { name: p.name.clone(), declared_type: p.declared_type.clone() })
            .collect();
        let expression = if is_external_marker(&func_def.body) {
            ElmNode::ExternalFunctionRef {
                name: func_def.name.clone(),
                operands: func_def.params.iter().map(|p| ElmNode::OperandRef(p.name.clone())).collect(),
            }
        } else {
            let mut scope = Scope::for_statement(context.clone());
            scope.locals.extend(func_def.params.iter().map(|p| p.name.clone()));
            lowerer.lower_expression(&func_def.body, &scope)
        };
        elm.statements.push(ElmStatement {
            name: func_def.name.clone(),
            context,
            is_public: func_def.is_public,
            function_params: Some(params),
            expression,
        });
    }

    (elm, diagnostics)
}

/// `define function Name(...): external` declares a signature with no CQL
/// body; the parser has no dedicated node for it, so it comes through as a
/// bare `external` identifier in the body position.
fn is_external_marker(body: &ExpressionNode) -> bool {
    matches!(body, ExpressionNode::Identifier(name) if name.eq_ignore_ascii_case("external"))
}

struct Lowerer<'t> {
    table: &'t SymbolTable,
    diagnostics: &'t mut Diagnostics,
}

impl<'t> Lowerer<'t> {
    fn lower_expression(&mut self, expr: &ExpressionNode, scope: &Scope) -> ElmNode {
        match expr {
            ExpressionNode::Literal(lit) => ElmNode::Literal(lower_literal(lit)),
            ExpressionNode::Identifier(name) => self.resolve_identifier(name, scope, None),
            ExpressionNode::QualifiedIdentifier { qualifier, name } => {
                self.resolve_identifier(name, scope, Some(qualifier))
            }
            ExpressionNode::Path { base, path } => {
                ElmNode::Property { source: Box::new(self.lower_expression(base, scope)), path: path.clone() }
            }
            ExpressionNode::BinaryOp(data) => {
                let left = self.lower_expression(&data.left, scope);
                let right = self.lower_expression(&data.right, scope);
                let op = binary_operator_to_elm(data.op);
                match try_fold_binary(op, &left, &right) {
                    Some(value) => ElmNode::Literal(value),
                    None => ElmNode::binary(op, left, right),
                }
            }
            ExpressionNode::UnaryOp { op, operand } => {
                let lowered = self.lower_expression(operand, scope);
                match op {
                    UnaryOperator::Positive => lowered,
                    UnaryOperator::Negate => fold_or_wrap(ElmOperator::Negate, lowered),
                    UnaryOperator::Not => fold_or_wrap(ElmOperator::Not, lowered),
                }
            }
            ExpressionNode::FunctionCall(data) => self.lower_call(&data.name, None, &data.args, scope),
            ExpressionNode::MethodCall(data) => self.lower_method(&data.base, &data.method, &data.args, scope),
            ExpressionNode::Index { base, index } => ElmNode::Indexer {
                source: Box::new(self.lower_expression(base, scope)),
                index: Box::new(self.lower_expression(index, scope)),
            },
            ExpressionNode::TypeCheck { expression, type_name } => ElmNode::operator(
                ElmOperator::Is,
                [self.lower_expression(expression, scope), ElmNode::Literal(Value::String(type_name.clone()))],
            ),
            ExpressionNode::TypeCast { expression, type_name } => ElmNode::operator(
                ElmOperator::As,
                [self.lower_expression(expression, scope), ElmNode::Literal(Value::String(type_name.clone()))],
            ),
            ExpressionNode::Lambda(data) => self.lower_expression(&data.body, scope),
            ExpressionNode::Conditional(data) => ElmNode::If {
                condition: Box::new(self.lower_expression(&data.condition, scope)),
                then_branch: Box::new(self.lower_expression(&data.then_expr, scope)),
                else_branch: Box::new(self.lower_expression(&data.else_expr, scope)),
            },
            ExpressionNode::Case(data) => ElmNode::Case {
                comparand: data.selector.as_ref().map(|s| Box::new(self.lower_expression(s, scope))),
                items: data
                    .items
                    .iter()
                    .map(|i| ElmCaseItem { when: self.lower_expression(&i.when, scope), then: self.lower_expression(&i.then, scope) })
                    .collect(),
                else_branch: Box::new(self.lower_expression(&data.else_expr, scope)),
            },
            ExpressionNode::Variable(name) => ElmNode::OperandRef(name.clone()),
            ExpressionNode::ParameterRef(name) => {
                if self.table.parameters.contains_key(name) {
                    ElmNode::ParameterRef(name.clone())
                } else {
                    self.diagnostics.push(ElmError::UnresolvedReference { name: name.clone() }.into_diagnostic());
                    ElmNode::Literal(Value::Null)
                }
            }
            ExpressionNode::TupleLiteral(fields) => ElmNode::Tuple {
                elements: fields.iter().map(|(k, v)| (k.clone(), self.lower_expression(v, scope))).collect(),
            },
            ExpressionNode::ListLiteral { element_type, elements } => ElmNode::List {
                element_type: element_type.clone(),
                elements: elements.iter().map(|e| self.lower_expression(e, scope)).collect(),
            },
            ExpressionNode::IntervalLiteral(data) => ElmNode::Interval {
                low: Box::new(self.lower_expression(&data.low, scope)),
                high: Box::new(self.lower_expression(&data.high, scope)),
                low_closed: data.low_closed,
                high_closed: data.high_closed,
            },
            ExpressionNode::Retrieve(data) => self.lower_retrieve(data, scope),
            ExpressionNode::Query(data) => self.lower_query(data, scope),
            ExpressionNode::Exists(inner) => ElmNode::unary(ElmOperator::Exists, self.lower_expression(inner, scope)),
        }
    }

    fn resolve_identifier(&mut self, name: &str, scope: &Scope, qualifier: Option<&str>) -> ElmNode {
        if let Some(q) = qualifier {
            return match self.table.includes.get(q) {
                Some((lib_name, _version)) => ElmNode::ExpressionRef { name: name.to_string(), library_name: Some(lib_name.clone()) },
                None => {
                    self.diagnostics.push(ElmError::UnresolvedInclude { name: q.to_string(), version: None }.into_diagnostic());
                    ElmNode::Literal(Value::Null)
                }
            };
        }
        if scope.locals.contains(name) {
            return ElmNode::OperandRef(name.to_string());
        }
        if self.table.code_systems.contains_key(name) {
            return ElmNode::CodeSystemRef(name.to_string());
        }
        if self.table.valuesets.contains_key(name) {
            return ElmNode::ValuesetRef(name.to_string());
        }
        if self.table.codes.contains_key(name) {
            return ElmNode::CodeRef(name.to_string());
        }
        if self.table.concepts.contains_key(name) {
            return ElmNode::ConceptRef(name.to_string());
        }
        if let Some(entry) = self.table.definitions.get(name) {
            let referenced_context = entry.context.clone().unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
            let node = ElmNode::ExpressionRef { name: name.to_string(), library_name: None };
            return self.wrap_for_context(node, scope, &referenced_context, name);
        }
        self.diagnostics.push(ElmError::UnresolvedReference { name: name.to_string() }.into_diagnostic());
        ElmNode::Literal(Value::Null)
    }

    /// Wrap a cross-context reference in [`ElmOperator::Expand`] when the
    /// current statement runs at population scope but references a
    /// per-subject one; flag anything else as [`ElmError::ContextMismatch`].
    fn wrap_for_context(&mut self, node: ElmNode, scope: &Scope, referenced_context: &str, name: &str) -> ElmNode {
        if referenced_context == scope.statement_context || referenced_context == POPULATION_CONTEXT {
            return node;
        }
        if scope.statement_context == POPULATION_CONTEXT {
            return ElmNode::unary(ElmOperator::Expand, node);
        }
        self.diagnostics.push(
            ElmError::ContextMismatch {
                definition: name.to_string(),
                required: scope.statement_context.clone(),
                actual: referenced_context.to_string(),
            }
            .into_diagnostic(),
        );
        node
    }

    fn lower_method(&mut self, base_expr: &ExpressionNode, method: &str, args: &[Argument], scope: &Scope) -> ElmNode {
        if let ExpressionNode::Identifier(alias) = base_expr {
            if let Some((lib_name, _version)) = self.table.includes.get(alias).cloned() {
                let operands: Vec<ElmNode> = args.iter().map(|a| self.lower_expression(&a.value, scope)).collect();
                return ElmNode::FunctionRef { name: method.to_string(), library_name: Some(lib_name), operands };
            }
        }
        let base = self.lower_expression(base_expr, scope);
        self.lower_call(method, Some(base), args, scope)
    }

    fn lower_call(&mut self, name: &str, base: Option<ElmNode>, args: &[Argument], scope: &Scope) -> ElmNode {
        let mut operands: Vec<ElmNode> = Vec::with_capacity(args.len() + 1);
        operands.extend(base);
        operands.extend(args.iter().map(|a| self.lower_expression(&a.value, scope)));

        if let Some(target_type) = convert_to_type_suffix(name) {
            operands.push(ElmNode::Literal(Value::String(target_type.to_string())));
            return ElmNode::operator(ElmOperator::ConvertsTo, operands);
        }

        if let Some(op) = builtin_operator(name) {
            return ElmNode::operator(op, operands);
        }

        if let Some(entry) = self.table.definitions.get(name) {
            if matches!(entry.kind, DefinitionKind::Function) {
                return ElmNode::FunctionRef { name: name.to_string(), library_name: None, operands };
            }
        }

        self.diagnostics.push(ElmError::UnresolvedReference { name: name.to_string() }.into_diagnostic());
        ElmNode::Literal(Value::Null)
    }

    fn lower_retrieve(&mut self, data: &RetrieveData, scope: &Scope) -> ElmNode {
        let code_filter = data.code_filter.as_ref().map(|f| Box::new(self.lower_expression(f, scope)));
        ElmNode::Retrieve(Box::new(ElmRetrieve {
            resource_type: data.resource_type.clone(),
            code_filter,
            code_path: data.code_path.clone(),
            date_filter: None,
        }))
    }

    fn lower_query(&mut self, data: &QueryData, scope: &Scope) -> ElmNode {
        let mut inner = scope.clone();
        let mut sources = Vec::with_capacity(data.sources.len());
        for src in &data.sources {
            let expression = self.lower_expression(&src.expression, scope);
            inner.locals.insert(src.alias.clone());
            sources.push(ElmAliasedSource { alias: src.alias.clone(), expression });
        }

        let mut relationships = Vec::with_capacity(data.relationships.len());
        for rel in &data.relationships {
            let source_expr = self.lower_expression(&rel.source.expression, scope);
            inner.locals.insert(rel.source.alias.clone());
            let condition = self.lower_expression(&rel.condition, &inner);
            relationships.push(ElmRelationship {
                negate: rel.negate,
                alias: rel.source.alias.clone(),
                source: source_expr,
                condition,
            });
        }

        let mut lets = Vec::with_capacity(data.lets.len());
        for l in &data.lets {
            let expression = self.lower_expression(&l.expression, &inner);
            inner.locals.insert(l.name.clone());
            lets.push(ElmLetClause { name: l.name.clone(), expression });
        }

        let where_clause = data.where_clause.as_ref().map(|w| self.lower_expression(w, &inner));
        let return_clause = data.return_clause.as_ref().map(|r| self.lower_expression(r, &inner));
        let aggregate = data.aggregate_clause.as_ref().map(|agg| {
            let mut agg_scope = inner.clone();
            agg_scope.locals.insert(agg.result_alias.clone());
            ElmAggregateClause {
                result_alias: agg.result_alias.clone(),
                starting: agg.starting.as_ref().map(|s| Box::new(self.lower_expression(s, &inner))),
                body: Box::new(self.lower_expression(&agg.body, &agg_scope)),
            }
        });
        let sort = data
            .sort
            .iter()
            .map(|s| ElmSortItem {
                expression: self.lower_expression(&s.expression, &inner),
                direction: match s.direction {
                    SortDirection::Ascending => ElmSortDirection::Ascending,
                    SortDirection::Descending => ElmSortDirection::Descending,
                },
            })
            .collect();

        ElmNode::Query(Box::new(ElmQuery {
            sources,
            relationships,
            lets,
            where_clause,
            return_clause,
            return_distinct: data.return_distinct,
            aggregate,
            sort,
        }))
    }
}

fn binary_operator_to_elm(op: BinaryOperator) -> ElmOperator {
    match op {
        BinaryOperator::Implies => ElmOperator::Implies,
        BinaryOperator::Or => ElmOperator::Or,
        BinaryOperator::Xor => ElmOperator::Xor,
        BinaryOperator::And => ElmOperator::And,
        BinaryOperator::In => ElmOperator::In,
        BinaryOperator::Contains => ElmOperator::Contains,
        BinaryOperator::Equal => ElmOperator::Equal,
        BinaryOperator::NotEqual => ElmOperator::NotEqual,
        BinaryOperator::Equivalent => ElmOperator::Equivalent,
        BinaryOperator::NotEquivalent => ElmOperator::NotEquivalent,
        BinaryOperator::Less => ElmOperator::Less,
        BinaryOperator::Greater => ElmOperator::Greater,
        BinaryOperator::LessOrEqual => ElmOperator::LessOrEqual,
        BinaryOperator::GreaterOrEqual => ElmOperator::GreaterOrEqual,
        BinaryOperator::Concat => ElmOperator::Concatenate,
        BinaryOperator::Union => ElmOperator::Union,
        BinaryOperator::Add => ElmOperator::Add,
        BinaryOperator::Subtract => ElmOperator::Subtract,
        BinaryOperator::Multiply => ElmOperator::Multiply,
        BinaryOperator::Divide => ElmOperator::Divide,
        BinaryOperator::TruncatedDivide => ElmOperator::TruncatedDivide,
        BinaryOperator::Modulo => ElmOperator::Modulo,
        BinaryOperator::Power => ElmOperator::Power,
    }
}

/// `ConvertsToInteger`/`ConvertsToDecimal`/... carry their target type in
/// the function name itself; [`ElmOperator::ConvertsTo`] takes it as a
/// trailing string operand instead (same trick as `Is`/`As`).
fn convert_to_type_suffix(name: &str) -> Option<&'static str> {
    Some(match name {
        "ConvertsToBoolean" => "Boolean",
        "ConvertsToInteger" => "Integer",
        "ConvertsToLong" => "Long",
        "ConvertsToDecimal" => "Decimal",
        "ConvertsToQuantity" => "Quantity",
        "ConvertsToDate" => "Date",
        "ConvertsToDateTime" => "DateTime",
        "ConvertsToTime" => "Time",
        "ConvertsToString" => "String",
        _ => return None,
    })
}

/// Name lookup for CQL/FHIRPath built-in functions that map onto a single
/// [`ElmOperator`]. Interval relation keywords (`overlaps`, `during`, ...)
/// have no dedicated infix token in this grammar, so they are reached only
/// through this table as ordinary function calls (documented in DESIGN.md).
fn builtin_operator(name: &str) -> Option<ElmOperator> {
    use ElmOperator::*;
    Some(match name {
        "Abs" => Abs,
        "Ceiling" => Ceiling,
        "Floor" => Floor,
        "Round" => Round,
        "Truncate" => Truncate,
        "Sqrt" => Sqrt,
        "Ln" => Ln,
        "Log" => Log,
        "Exp" => Exp,
        "Predecessor" => Predecessor,
        "Successor" => Successor,

        "Exists" => Exists,
        "First" => First,
        "Last" => Last,
        "Tail" => Tail,
        "Skip" => Skip,
        "Take" => Take,
        "Single" => Single,
        "Count" => Count,
        "Distinct" => Distinct,
        "Flatten" => Flatten,
        "SubsetOf" => SubsetOf,
        "SupersetOf" => SupersetOf,
        "IsDistinct" => IsDistinct,

        "StartsWith" => StartsWith,
        "EndsWith" => EndsWith,
        "Matches" => Matches,
        "ReplaceMatches" => ReplaceMatches,
        "Replace" => Replace,
        "Length" => Length,
        "Substring" => Substring,
        "Upper" => Upper,
        "Lower" => Lower,
        "Trim" => Trim,
        "Split" => Split,
        "Join" => Join,
        "IndexOf" => IndexOf,
        "ToChars" => ToChars,
        "Encode" => Encode,
        "Decode" => Decode,

        "Today" => Today,
        "Now" => Now,
        "TimeOfDay" => TimeOfDay,
        "DateFrom" => DateFrom,
        "TimeFrom" => TimeFrom,
        "DurationBetween" => DurationBetween,
        "DifferenceBetween" => DifferenceBetween,

        "ToBoolean" => ToBoolean,
        "ToDecimal" => ToDecimal,
        "ToInteger" => ToInteger,
        "ToLong" => ToLong,
        "ToString" => ToString,
        "ToDate" => ToDate,
        "ToDateTime" => ToDateTime,
        "ToTime" => ToTime,
        "ToQuantity" => ToQuantity,
        "ToList" => ToList,

        "ConvertQuantity" => ConvertQuantity,
        "CanConvertQuantity" => CanConvertQuantity,

        "Overlaps" => IntervalOverlaps,
        "During" => IntervalDuring,
        "Before" => IntervalBefore,
        "After" => IntervalAfter,
        "Starts" => IntervalStarts,
        "Ends" => IntervalEnds,
        "Width" => IntervalWidth,
        "Includes" => IntervalContains,
        "Start" => Start,
        "End" => End,

        "Sum" => Sum,
        "Avg" => Avg,
        "Median" => Median,
        "Min" => Min,
        "Max" => Max,
        "StdDev" => StdDev,
        "Variance" => Variance,
        "GeometricMean" => GeometricMean,
        "Product" => Product,
        "AllTrue" => AllTrue,
        "AnyTrue" => AnyTrue,

        "AgeInYears" => AgeInYears,
        "AgeInMonths" => AgeInMonths,
        "CalculateAgeAt" => CalculateAgeAt,

        "InValueSet" => InValueSet,
        "Subsumes" => Subsumes,
        "SubsumedBy" => SubsumedBy,

        "IsNull" => IsNull,
        "IsTrue" => IsTrue,
        "IsFalse" => IsFalse,
        "Coalesce" => Coalesce,

        _ => return None,
    })
}

fn fold_or_wrap(op: ElmOperator, operand: ElmNode) -> ElmNode {
    match try_fold_unary(op, &operand) {
        Some(value) => ElmNode::Literal(value),
        None => ElmNode::unary(op, operand),
    }
}

/// Literal folding over `Value`'s own operators (`equal`/`equivalent`/
/// kleene) plus a small arithmetic table, scoped to Integer/Long/Decimal
/// pairs — full numeric tower promotion and everything else belongs to the
/// function registry this crate does not depend on (DESIGN.md).
fn try_fold_binary(op: ElmOperator, left: &ElmNode, right: &ElmNode) -> Option<Value> {
    let (l, r) = (left.as_literal()?, right.as_literal()?);
    match op {
        ElmOperator::Add
        | ElmOperator::Subtract
        | ElmOperator::Multiply
        | ElmOperator::Divide
        | ElmOperator::TruncatedDivide
        | ElmOperator::Modulo
        | ElmOperator::Power => fold_arithmetic(op, l, r),
        ElmOperator::And => Some(kleene_value(kleene::and(as_kleene(l)?, as_kleene(r)?))),
        ElmOperator::Or => Some(kleene_value(kleene::or(as_kleene(l)?, as_kleene(r)?))),
        ElmOperator::Xor => Some(kleene_value(kleene::xor(as_kleene(l)?, as_kleene(r)?))),
        ElmOperator::Implies => Some(kleene_value(kleene::implies(as_kleene(l)?, as_kleene(r)?))),
        ElmOperator::Equal => Some(match l.equal(r) {
            Some(b) => Value::Boolean(b),
            None => Value::Null,
        }),
        ElmOperator::Equivalent => Some(Value::Boolean(l.equivalent(r))),
        _ => None,
    }
}

fn try_fold_unary(op: ElmOperator, operand: &ElmNode) -> Option<Value> {
    let v = operand.as_literal()?;
    match (op, v) {
        (ElmOperator::Negate, Value::Integer(i)) => i.checked_neg().map(Value::Integer),
        (ElmOperator::Negate, Value::Long(i)) => i.checked_neg().map(Value::Long),
        (ElmOperator::Negate, Value::Decimal(d)) => Some(Value::Decimal(-*d)),
        (ElmOperator::Not, Value::Boolean(b)) => Some(Value::Boolean(!b)),
        (ElmOperator::Not, Value::Null) => Some(Value::Null),
        _ => None,
    }
}

fn as_kleene(value: &Value) -> Option<Option<bool>> {
    match value {
        Value::Boolean(b) => Some(Some(*b)),
        Value::Null => Some(None),
        _ => None,
    }
}

fn kleene_value(result: Option<bool>) -> Value {
    result.map(Value::Boolean).unwrap_or(Value::Null)
}

fn fold_arithmetic(op: ElmOperator, l: &Value, r: &Value) -> Option<Value> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            match op {
                ElmOperator::Add => a.checked_add(b).map(Value::Integer),
                ElmOperator::Subtract => a.checked_sub(b).map(Value::Integer),
                ElmOperator::Multiply => a.checked_mul(b).map(Value::Integer),
                ElmOperator::TruncatedDivide if b != 0 => Some(Value::Integer(a / b)),
                ElmOperator::Modulo if b != 0 => Some(Value::Integer(a % b)),
                ElmOperator::Divide if b != 0 => Some(Value::Decimal(Decimal::from(a) / Decimal::from(b))),
                ElmOperator::Power => u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)).map(Value::Integer),
                _ => None,
            }
        }
        (Value::Long(a), Value::Long(b)) => {
            let (a, b) = (*a, *b);
            match op {
                ElmOperator::Add => a.checked_add(b).map(Value::Long),
                ElmOperator::Subtract => a.checked_sub(b).map(Value::Long),
                ElmOperator::Multiply => a.checked_mul(b).map(Value::Long),
                ElmOperator::TruncatedDivide if b != 0 => Some(Value::Long(a / b)),
                ElmOperator::Modulo if b != 0 => Some(Value::Long(a % b)),
                _ => None,
            }
        }
        (Value::Decimal(a), Value::Decimal(b)) => {
            let (a, b) = (*a, *b);
            match op {
                ElmOperator::Add => Some(Value::Decimal(a + b)),
                ElmOperator::Subtract => Some(Value::Decimal(a - b)),
                ElmOperator::Multiply => Some(Value::Decimal(a * b)),
                ElmOperator::Divide if !b.is_zero() => Some(Value::Decimal(a / b)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn lower_literal(lit: &LiteralValue) -> Value {
    match lit {
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Integer(i) => Value::Integer(*i),
        LiteralValue::Long(l) => Value::Long(*l),
        LiteralValue::Decimal(s) => Value::Decimal(parse_decimal(s)),
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Date(s) => Value::Date(parse_precision_date(s)),
        LiteralValue::DateTime(s) => Value::DateTime(parse_precision_datetime(s)),
        LiteralValue::Time(s) => Value::Time(parse_precision_time(s)),
        LiteralValue::Quantity { value, unit } => Value::Quantity(Quantity::with_unit(parse_decimal(value), unit.clone())),
        LiteralValue::Ratio { numerator, denominator } => Value::Ratio(Ratio {
            numerator: Quantity::with_unit(parse_decimal(&numerator.0), numerator.1.clone()),
            denominator: Quantity::with_unit(parse_decimal(&denominator.0), denominator.1.clone()),
        }),
        LiteralValue::Null => Value::Null,
    }
}

fn parse_decimal(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap_or_default()
}

/// Parse `YYYY[-MM[-DD]]`, the inverse of [`PrecisionDate`]'s `Display`. The
/// lexer has already validated the character shape; a failed numeric parse
/// here falls back to year 1 rather than panicking.
pub(crate) fn parse_precision_date(text: &str) -> PrecisionDate {
    let text = text.trim_start_matches('@');
    let mut parts = text.splitn(3, '-');
    let year = parts.next().and_then(|y| y.parse::<i32>().ok()).unwrap_or(1);
    let month = parts.next().and_then(|m| m.parse::<u32>().ok());
    let day = parts.next().and_then(|d| d.parse::<u32>().ok());
    match (month, day) {
        (Some(m), Some(d)) => PrecisionDate::full(year, m, d),
        (Some(m), None) => PrecisionDate::year_month(year, m),
        _ => PrecisionDate::year(year),
    }
}

/// Parse `HH[:MM[:SS[.mmm]]]`, the inverse of [`PrecisionTime`]'s `Display`.
pub(crate) fn parse_precision_time(text: &str) -> PrecisionTime {
    let text = text.trim_start_matches('@').trim_start_matches('T');
    let mut segments = text.splitn(2, '.');
    let hms = segments.next().unwrap_or("");
    let frac = segments.next();

    let mut hms_parts = hms.split(':');
    let hour = hms_parts.next().and_then(|h| h.parse::<u32>().ok()).unwrap_or(0);
    let minute = hms_parts.next().and_then(|m| m.parse::<u32>().ok());
    let second = hms_parts.next().and_then(|s| s.parse::<u32>().ok());
    let millisecond = frac.map(|f| {
        let mut padded = f.to_string();
        while padded.len() < 3 {
            padded.push('0');
        }
        padded.truncate(3);
        padded.parse::<u32>().unwrap_or(0)
    });

    PrecisionTime::new(hour, minute, second, millisecond)
}

/// Parse `YYYY-MM-DDTHH:MM:SS.mmm(Z|+HH:MM|-HH:MM)`, the inverse of
/// [`PrecisionDateTime`]'s `Display`.
pub(crate) fn parse_precision_datetime(text: &str) -> PrecisionDateTime {
    let text = text.trim_start_matches('@');
    let (date_part, rest) = match text.split_once('T') {
        Some((d, r)) => (d, Some(r)),
        None => (text, None),
    };
    let date = parse_precision_date(date_part);

    let (time_part, offset) = match rest {
        None => (None, None),
        Some(r) => {
            if let Some(stripped) = r.strip_suffix('Z') {
                (Some(stripped), Some(0))
            } else if let Some(pos) = r.rfind(['+', '-']) {
                if pos > 0 {
                    let (t, off) = r.split_at(pos);
                    (Some(t), parse_offset(off))
                } else {
                    (Some(r), None)
                }
            } else {
                (Some(r), None)
            }
        }
    };
    let time = time_part.filter(|t| !t.is_empty()).map(parse_precision_time);
    PrecisionDateTime::new(date, time, offset)
}

fn parse_offset(text: &str) -> Option<i32> {
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let rest = text.get(1..)?;
    let mut parts = rest.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some(sign * (hours * 60 + minutes))
}

/// DFS cycle detection over the reference graph induced by `define`
/// bodies. A back edge to a name still on the recursion stack is a real
/// cycle; the evaluator's own bounded recursion counter is the
/// runtime backstop for anything this misses.
fn detect_definition_cycles(library: &LibraryAst, table: &SymbolTable, diagnostics: &mut Diagnostics) {
    let mut bodies: FxHashMap<&str, &ExpressionNode> = FxHashMap::default();
    for expr_def in &library.expressions {
        bodies.insert(expr_def.name.as_str(), &expr_def.expression);
    }
    for func_def in &library.functions {
        bodies.insert(func_def.name.as_str(), &func_def.body);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: FxHashMap<String, Mark> = FxHashMap::default();
    let mut reported: FxHashSet<String> = FxHashSet::default();

    fn visit(
        name: &str,
        bodies: &FxHashMap<&str, &ExpressionNode>,
        table: &SymbolTable,
        marks: &mut FxHashMap<String, Mark>,
        stack: &mut Vec<String>,
        reported: &mut FxHashSet<String>,
        diagnostics: &mut Diagnostics,
    ) {
        if marks.get(name) == Some(&Mark::Done) {
            return;
        }
        if stack.iter().any(|s| s == name) {
            if reported.insert(name.to_string()) {
                let start = stack.iter().position(|s| s == name).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].to_vec();
                cycle.push(name.to_string());
                diagnostics.push(ElmError::CyclicDefinition(cycle).into_diagnostic());
            }
            return;
        }
        let Some(body) = bodies.get(name) else { return };
        marks.insert(name.to_string(), Mark::Visiting);
        stack.push(name.to_string());
        let mut referenced = Vec::new();
        collect_referenced_names(body, table, &mut referenced);
        for next in referenced {
            visit(&next, bodies, table, marks, stack, reported, diagnostics);
        }
        stack.pop();
        marks.insert(name.to_string(), Mark::Done);
    }

    for name in table.definitions.keys() {
        let mut stack = Vec::new();
        visit(name, &bodies, table, &mut marks, &mut stack, &mut reported, diagnostics);
    }
}

/// Walk an expression tree collecting every identifier that names a local
/// definition, for cycle detection only (not full name resolution).
fn collect_referenced_names(expr: &ExpressionNode, table: &SymbolTable, out: &mut Vec<String>) {
    let mut push_if_def = |name: &str, out: &mut Vec<String>| {
        if table.definitions.contains_key(name) {
            out.push(name.to_string());
        }
    };
    match expr {
        ExpressionNode::Identifier(name) => push_if_def(name, out),
        ExpressionNode::QualifiedIdentifier { .. } => {}
        ExpressionNode::Literal(_) | ExpressionNode::Variable(_) | ExpressionNode::ParameterRef(_) => {}
        ExpressionNode::Path { base, .. } => collect_referenced_names(base, table, out),
        ExpressionNode::BinaryOp(data) => {
            collect_referenced_names(&data.left, table, out);
            collect_referenced_names(&data.right, table, out);
        }
        ExpressionNode::UnaryOp { operand, .. } => collect_referenced_names(operand, table, out),
        ExpressionNode::FunctionCall(data) => {
            push_if_def(&data.name, out);
            for a in &data.args {
                collect_referenced_names(&a.value, table, out);
            }
        }
        ExpressionNode::MethodCall(data) => {
            collect_referenced_names(&data.base, table, out);
            for a in &data.args {
                collect_referenced_names(&a.value, table, out);
            }
        }
        ExpressionNode::Index { base, index } => {
            collect_referenced_names(base, table, out);
            collect_referenced_names(index, table, out);
        }
        ExpressionNode::TypeCheck { expression, .. } | ExpressionNode::TypeCast { expression, .. } => {
            collect_referenced_names(expression, table, out)
        }
        ExpressionNode::Lambda(data) => collect_referenced_names(&data.body, table, out),
        ExpressionNode::Conditional(data) => {
            collect_referenced_names(&data.condition, table, out);
            collect_referenced_names(&data.then_expr, table, out);
            collect_referenced_names(&data.else_expr, table, out);
        }
        ExpressionNode::Case(data) => {
            if let Some(s) = &data.selector {
                collect_referenced_names(s, table, out);
            }
            for item in &data.items {
                collect_referenced_names(&item.when, table, out);
                collect_referenced_names(&item.then, table, out);
            }
            collect_referenced_names(&data.else_expr, table, out);
        }
        ExpressionNode::TupleLiteral(fields) => {
            for (_, v) in fields {
                collect_referenced_names(v, table, out);
            }
        }
        ExpressionNode::ListLiteral { elements, .. } => {
            for e in elements {
                collect_referenced_names(e, table, out);
            }
        }
        ExpressionNode::IntervalLiteral(data) => {
            collect_referenced_names(&data.low, table, out);
            collect_referenced_names(&data.high, table, out);
        }
        ExpressionNode::Retrieve(data) => {
            if let Some(f) = &data.code_filter {
                collect_referenced_names(f, table, out);
            }
        }
        ExpressionNode::Query(data) => {
            for s in &data.sources {
                collect_referenced_names(&s.expression, table, out);
            }
            for r in &data.relationships {
                collect_referenced_names(&r.source.expression, table, out);
                collect_referenced_names(&r.condition, table, out);
            }
            for l in &data.lets {
                collect_referenced_names(&l.expression, table, out);
            }
            if let Some(w) = &data.where_clause {
                collect_referenced_names(w, table, out);
            }
            if let Some(r) = &data.return_clause {
                collect_referenced_names(r, table, out);
            }
            if let Some(agg) = &data.aggregate_clause {
                if let Some(s) = &agg.starting {
                    collect_referenced_names(s, table, out);
                }
                collect_referenced_names(&agg.body, table, out);
            }
            for s in &data.sort {
                collect_referenced_names(&s.expression, table, out);
            }
        }
        ExpressionNode::Exists(inner) => collect_referenced_names(inner, table, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source_library: LibraryAst) -> (ElmLibrary, Diagnostics) {
        lower_library(&source_library)
    }

    #[test]
    fn arithmetic_literals_fold_to_a_single_value() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "Seven".to_string(),
            context: None,
            is_public: true,
            expression: ExpressionNode::binary_op(
                BinaryOperator::Add,
                ExpressionNode::literal(LiteralValue::Integer(1)),
                ExpressionNode::binary_op(
                    BinaryOperator::Multiply,
                    ExpressionNode::literal(LiteralValue::Integer(2)),
                    ExpressionNode::literal(LiteralValue::Integer(3)),
                ),
            ),
        });
        let (elm, diagnostics) = lower(library);
        assert!(diagnostics.is_empty());
        let statement = elm.statement("Seven").unwrap();
        assert_eq!(statement.expression, ElmNode::Literal(Value::Integer(7)));
    }

    #[test]
    fn unresolved_identifier_is_flagged_not_fatal() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "Bad".to_string(),
            context: None,
            is_public: true,
            expression: ExpressionNode::identifier("NoSuchThing"),
        });
        let (elm, diagnostics) = lower(library);
        assert!(!diagnostics.is_empty());
        assert_eq!(elm.statement("Bad").unwrap().expression, ElmNode::Literal(Value::Null));
    }

    #[test]
    fn reference_to_another_definition_becomes_expression_ref() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "A".to_string(),
            context: Some("Patient".to_string()),
            is_public: true,
            expression: ExpressionNode::literal(LiteralValue::Integer(1)),
        });
        library.expressions.push(ExpressionDef {
            name: "B".to_string(),
            context: Some("Patient".to_string()),
            is_public: true,
            expression: ExpressionNode::identifier("A"),
        });
        let (elm, diagnostics) = lower(library);
        assert!(diagnostics.is_empty());
        assert_eq!(
            elm.statement("B").unwrap().expression,
            ElmNode::ExpressionRef { name: "A".to_string(), library_name: None }
        );
    }

    #[test]
    fn population_context_reference_to_patient_context_is_expanded() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "PatientLevel".to_string(),
            context: Some("Patient".to_string()),
            is_public: true,
            expression: ExpressionNode::literal(LiteralValue::Integer(1)),
        });
        library.expressions.push(ExpressionDef {
            name: "PopulationLevel".to_string(),
            context: Some("Unfiltered".to_string()),
            is_public: true,
            expression: ExpressionNode::identifier("PatientLevel"),
        });
        let (elm, _) = lower(library);
        match &elm.statement("PopulationLevel").unwrap().expression {
            ElmNode::Operator { op: ElmOperator::Expand, operands } => assert_eq!(operands.len(), 1),
            other => panic!("expected Expand wrapper, got {other:?}"),
        }
    }

    #[test]
    fn self_referential_definition_is_flagged_as_cyclic() {
        let mut library = LibraryAst::new();
        library.expressions.push(ExpressionDef {
            name: "Loop".to_string(),
            context: None,
            is_public: true,
            expression: ExpressionNode::identifier("Loop"),
        });
        let (_, diagnostics) = lower(library);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn date_literal_parses_full_precision() {
        let lowered = lower_literal(&LiteralValue::Date("1990-01-01".to_string()));
        assert_eq!(lowered, Value::Date(PrecisionDate::full(1990, 1, 1)));
    }

    #[test]
    fn datetime_literal_parses_with_utc_offset() {
        let lowered = lower_literal(&LiteralValue::DateTime("2024-06-15T08:30:00Z".to_string()));
        match lowered {
            Value::DateTime(dt) => {
                assert_eq!(dt.date, PrecisionDate::full(2024, 6, 15));
                assert_eq!(dt.tz_offset_minutes, Some(0));
            }
            other => panic!("expected DateTime, got {other:?}"),
        }
    }
}
