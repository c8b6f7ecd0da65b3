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

//! The ELM tree-walker: one function per [`ElmNode`] variant,
//! a single `match` over [`ElmOperator`] for the ~150 built-in operators.
//! Single-threaded, recursive, memoized by `ExpressionRef` name within one
//! [`EvaluationContext`].

use crate::context::EvaluationContext;
use crate::datasource::{CodeFilter, DateFilter};
use crate::error::{EvalError, EvalResult};
use crate::navigator;
use crate::operators;
use crate::temporal_literal;
use octofhir_cql_core::{Code, Concept, Interval, Tuple, Value};
use octofhir_cql_elm::{ElmCaseItem, ElmNode, ElmOperator, ElmQuery, ElmRetrieve};

/// Convert a raw JSON leaf (what [`navigator::navigate_property`] returns)
/// into a runtime [`Value`]. Objects and arrays of objects stay `Resource`
/// so deeper navigation can keep looking inside them; JSON primitives map
/// onto their CQL counterparts directly.
fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                rust_decimal::Decimal::try_from(f).map(Value::Decimal).unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => {
            if looks_like_date_or_datetime(s) {
                temporal_literal::parse_date_or_datetime(s).unwrap_or_else(|| Value::String(s.clone()))
            } else {
                Value::String(s.clone())
            }
        }
        serde_json::Value::Array(_) => Value::Resource(json.clone()),
        serde_json::Value::Object(_) => Value::Resource(json.clone()),
    }
}

fn looks_like_date_or_datetime(s: &str) -> bool {
    s.len() >= 4 && s.as_bytes()[..4].iter().all(|b| b.is_ascii_digit()) && (s.len() == 4 || s.as_bytes()[4] == b'-')
}

fn collapse(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.pop().unwrap()
    } else {
        Value::List(values)
    }
}

fn check_cancel(ctx: &EvaluationContext) -> EvalResult<()> {
    if ctx.is_cancelled() {
        return Err(EvalError::Cancelled);
    }
    Ok(())
}

pub fn eval_node(node: &ElmNode, ctx: &EvaluationContext) -> EvalResult<Value> {
    check_cancel(ctx)?;
    match node {
        ElmNode::Literal(v) => Ok(v.clone()),
        ElmNode::ExpressionRef { name, library_name } => eval_expression_ref(name, library_name.as_deref(), ctx),
        ElmNode::ParameterRef(name) => Ok(ctx.parameter(name).cloned().unwrap_or(Value::Null)),
        ElmNode::CodeSystemRef(name) => eval_code_system_ref(name, ctx),
        ElmNode::ValuesetRef(name) => eval_valueset_ref(name, ctx),
        ElmNode::CodeRef(name) => eval_code_ref(name, ctx),
        ElmNode::ConceptRef(name) => eval_concept_ref(name, ctx),
        ElmNode::OperandRef(name) => {
            ctx.variable(name).cloned().ok_or_else(|| EvalError::VariableNotFound { name: name.clone() })
        }
        ElmNode::Property { source, path } => eval_property(source, path, ctx),
        ElmNode::Indexer { source, index } => eval_indexer(source, index, ctx),
        ElmNode::Operator { op, operands } => eval_operator(*op, operands, ctx),
        ElmNode::If { condition, then_branch, else_branch } => {
            let cond = eval_node(condition, ctx)?;
            match cond.boolean() {
                Some(true) => eval_node(then_branch, ctx),
                _ => eval_node(else_branch, ctx),
            }
        }
        ElmNode::Case { comparand, items, else_branch } => eval_case(comparand.as_deref(), items, else_branch, ctx),
        ElmNode::Tuple { elements } => {
            let mut tuple = Tuple::new();
            for (name, expr) in elements {
                tuple.insert(name.clone(), eval_node(expr, ctx)?);
            }
            Ok(Value::Tuple(tuple))
        }
        ElmNode::List { elements, .. } => {
            let mut out = Vec::with_capacity(elements.len());
            for element in elements {
                out.push(eval_node(element, ctx)?);
            }
            Ok(Value::List(out))
        }
        ElmNode::Interval { low, high, low_closed, high_closed } => {
            let low = eval_node(low, ctx)?;
            let high = eval_node(high, ctx)?;
            let high_kind = high.kind();
            Interval::new(low, high, *low_closed, *high_closed)
                .map(Box::new)
                .map(Value::Interval)
                .map_err(|_| EvalError::TypeMismatch { op: "Interval".into(), expected: "comparable bounds".into(), actual: high_kind })
        }
        ElmNode::Retrieve(retrieve) => eval_retrieve(retrieve, ctx),
        ElmNode::Query(query) => eval_query(query, ctx),
        ElmNode::FunctionRef { name, library_name, operands } => eval_function_ref(name, library_name.as_deref(), operands, ctx),
        ElmNode::ExternalFunctionRef { name, .. } => Err(EvalError::UnresolvedReference { name: name.clone() }),
    }
}

fn eval_expression_ref(name: &str, library_name: Option<&str>, ctx: &EvaluationContext) -> EvalResult<Value> {
    let lookup_name = qualified_lookup_name(name, library_name);
    let memo_key = format!("expr:{lookup_name}");
    if let Some(cached) = ctx.memoized(&memo_key) {
        return Ok(cached);
    }
    let statement = ctx
        .library
        .statement(&lookup_name)
        .ok_or_else(|| EvalError::UnresolvedInclude { name: name.to_string(), version: None })?;
    let inner = ctx.enter()?;
    let result = eval_node(&statement.expression, &inner)?;
    ctx.memoize(memo_key, result.clone());
    Ok(result)
}

/// A cross-library reference's qualified name, as the library manager
/// (`octofhir-cql-library`) flattens an `include`d library's definitions
/// into the including library's statement list (`Alias.DefName`).
fn qualified_lookup_name(name: &str, library_name: Option<&str>) -> String {
    match library_name {
        Some(lib) => format!("{lib}.{name}"),
        None => name.to_string(),
    }
}

fn eval_code_system_ref(name: &str, ctx: &EvaluationContext) -> EvalResult<Value> {
    ctx.library
        .code_systems
        .iter()
        .find(|cs| cs.name == name)
        .map(|cs| Value::String(cs.id.clone()))
        .ok_or_else(|| EvalError::UnresolvedReference { name: name.to_string() })
}

fn eval_valueset_ref(name: &str, ctx: &EvaluationContext) -> EvalResult<Value> {
    ctx.library
        .valuesets
        .iter()
        .find(|vs| vs.name == name)
        .map(|vs| Value::String(vs.id.clone()))
        .ok_or_else(|| EvalError::UnresolvedReference { name: name.to_string() })
}

fn eval_code_ref(name: &str, ctx: &EvaluationContext) -> EvalResult<Value> {
    ctx.library
        .codes
        .iter()
        .find(|c| c.name == name)
        .map(|c| Value::Code(Code { system: c.system.clone(), code: c.code.clone(), version: None, display: c.display.clone() }))
        .ok_or_else(|| EvalError::UnresolvedReference { name: name.to_string() })
}

fn eval_concept_ref(name: &str, ctx: &EvaluationContext) -> EvalResult<Value> {
    let def = ctx
        .library
        .concepts
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| EvalError::UnresolvedReference { name: name.to_string() })?;
    let mut coding = Vec::with_capacity(def.codes.len());
    for code_name in &def.codes {
        if let Value::Code(code) = eval_code_ref(code_name, ctx)? {
            coding.push(code);
        }
    }
    Ok(Value::Concept(Concept { text: def.display.clone(), coding }))
}

fn eval_property(source: &ElmNode, path: &str, ctx: &EvaluationContext) -> EvalResult<Value> {
    let source_value = eval_node(source, ctx)?;
    let results: Vec<Value> = source_value
        .as_list()
        .iter()
        .flat_map(|item| match item {
            Value::Resource(json) => navigator::navigate_property(json, path).iter().map(json_to_value).collect::<Vec<_>>(),
            Value::Tuple(tuple) => tuple.get(path).cloned().into_iter().collect(),
            _ => Vec::new(),
        })
        .collect();
    if results.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(collapse(results))
    }
}

fn eval_indexer(source: &ElmNode, index: &ElmNode, ctx: &EvaluationContext) -> EvalResult<Value> {
    let list = eval_node(source, ctx)?.as_list();
    let index = match eval_node(index, ctx)? {
        Value::Integer(i) => i,
        _ => return Ok(Value::Null),
    };
    if index < 0 {
        return Ok(Value::Null);
    }
    Ok(list.get(index as usize).cloned().unwrap_or(Value::Null))
}

fn eval_case(
    comparand: Option<&ElmNode>,
    items: &[ElmCaseItem],
    else_branch: &ElmNode,
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    match comparand {
        Some(comparand) => {
            let comparand = eval_node(comparand, ctx)?;
            for item in items {
                let when = eval_node(&item.when, ctx)?;
                if comparand.equal(&when) == Some(true) {
                    return eval_node(&item.then, ctx);
                }
            }
            eval_node(else_branch, ctx)
        }
        None => {
            for item in items {
                let when = eval_node(&item.when, ctx)?;
                if when.boolean() == Some(true) {
                    return eval_node(&item.then, ctx);
                }
            }
            eval_node(else_branch, ctx)
        }
    }
}

fn resolve_code_list(node: &ElmNode, ctx: &EvaluationContext) -> EvalResult<Option<Vec<Code>>> {
    let value = eval_node(node, ctx)?;
    match value {
        Value::String(url) => {
            let expanded = ctx
                .terminology
                .expand(&url)
                .map_err(|e| EvalError::Terminology { message: e.to_string() })?;
            Ok(expanded.map(|pairs| pairs.into_iter().map(|(system, code)| Code::new(system, code)).collect()))
        }
        Value::Code(code) => Ok(Some(vec![code])),
        Value::List(items) => {
            let codes: Vec<Code> = items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Code(c) => Some(c),
                    _ => None,
                })
                .collect();
            Ok(Some(codes))
        }
        _ => Ok(None),
    }
}

fn eval_retrieve(retrieve: &ElmRetrieve, ctx: &EvaluationContext) -> EvalResult<Value> {
    check_cancel(ctx)?;
    let path = retrieve.code_path.as_deref().unwrap_or("code");

    let codes = match &retrieve.code_filter {
        Some(node) => resolve_code_list(node, ctx)?,
        None => None,
    };
    let code_filter = codes.as_deref().map(|codes| CodeFilter { path, codes });

    let date_range = match &retrieve.date_filter {
        Some(node) => match eval_node(node, ctx)? {
            Value::Interval(interval) => Some(*interval),
            _ => None,
        },
        None => None,
    };
    let date_filter = date_range.as_ref().map(|range| DateFilter { path: "date", range });

    let patient_id = match ctx.root.as_ref() {
        Value::Resource(json) if json.get("resourceType").and_then(|t| t.as_str()) == Some("Patient") => {
            json.get("id").and_then(|id| id.as_str())
        }
        _ => None,
    };

    let resources = ctx.data_source.retrieve(&retrieve.resource_type, patient_id, code_filter, date_filter);
    Ok(Value::List(resources.into_iter().map(Value::Resource).collect()))
}

/// One `alias in source` binding and the remaining unbound aliases, folded
/// left to right into every combination a multi-source query produces
/// (standard query cross-product semantics).
fn cartesian_bind(ctx: &EvaluationContext, sources: &[octofhir_cql_elm::ElmAliasedSource]) -> EvalResult<Vec<EvaluationContext>> {
    let mut contexts = vec![ctx.clone()];
    for source in sources {
        let mut next = Vec::new();
        for base in &contexts {
            let values = eval_node(&source.expression, base)?.as_list();
            for value in values {
                next.push(base.bind(source.alias.clone(), value.clone()).with_input(value));
            }
        }
        contexts = next;
    }
    Ok(contexts)
}

fn eval_query(query: &ElmQuery, ctx: &EvaluationContext) -> EvalResult<Value> {
    let mut rows = cartesian_bind(ctx, &query.sources)?;

    for relationship in &query.relationships {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            check_cancel(&row)?;
            let related_values = eval_node(&relationship.source, &row)?.as_list();
            let mut matched = false;
            for related in related_values {
                let candidate = row.bind(relationship.alias.clone(), related);
                if eval_node(&relationship.condition, &candidate)?.boolean() == Some(true) {
                    matched = true;
                    break;
                }
            }
            if matched != relationship.negate {
                kept.push(row);
            }
        }
        rows = kept;
    }

    for let_clause in &query.lets {
        let mut bound = Vec::with_capacity(rows.len());
        for row in rows {
            let value = eval_node(&let_clause.expression, &row)?;
            bound.push(row.bind(let_clause.name.clone(), value));
        }
        rows = bound;
    }

    if let Some(where_clause) = &query.where_clause {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            check_cancel(&row)?;
            if eval_node(where_clause, &row)?.boolean() == Some(true) {
                kept.push(row);
            }
        }
        rows = kept;
    }

    let mut results: Vec<Value> = match &query.return_clause {
        Some(return_clause) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(eval_node(return_clause, row)?);
            }
            out
        }
        None => rows.iter().map(|row| row.input.clone()).collect(),
    };

    if query.return_distinct {
        results = operators::collection::distinct(&Value::List(results)).as_list();
    }

    if !query.sort.is_empty() {
        sort_results(&mut results, query, ctx)?;
    }

    if let Some(aggregate) = &query.aggregate {
        return eval_aggregate_clause(aggregate, &results, ctx);
    }

    Ok(Value::List(results))
}

/// Sort items are expressions evaluated with each result bound as `$this`,
/// the same way a lambda body sees its argument. Multiple
/// sort items break ties left to right.
fn sort_results(results: &mut [Value], query: &ElmQuery, ctx: &EvaluationContext) -> EvalResult<()> {
    let mut keyed: Vec<(Value, Vec<Value>)> = Vec::with_capacity(results.len());
    for item in results.iter() {
        let row = ctx.bind("$this", item.clone()).with_input(item.clone());
        let mut keys = Vec::with_capacity(query.sort.len());
        for sort_item in &query.sort {
            keys.push(eval_node(&sort_item.expression, &row)?);
        }
        keyed.push((item.clone(), keys));
    }
    keyed.sort_by(|a, b| {
        for (index, sort_item) in query.sort.iter().enumerate() {
            let ordering = a.1[index].compare(&b.1[index]).ok().flatten().unwrap_or(std::cmp::Ordering::Equal);
            let ordering = match sort_item.direction {
                octofhir_cql_elm::ElmSortDirection::Ascending => ordering,
                octofhir_cql_elm::ElmSortDirection::Descending => ordering.reverse(),
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    for (slot, (sorted, _)) in results.iter_mut().zip(keyed) {
        *slot = sorted;
    }
    Ok(())
}

fn eval_aggregate_clause(
    aggregate: &octofhir_cql_elm::ElmAggregateClause,
    results: &[Value],
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    let mut accumulator = match &aggregate.starting {
        Some(starting) => eval_node(starting, ctx)?,
        None => Value::Null,
    };
    for item in results {
        let row = ctx.bind(aggregate.result_alias.clone(), accumulator.clone()).with_input(item.clone());
        accumulator = eval_node(&aggregate.body, &row)?;
    }
    Ok(accumulator)
}

fn eval_function_ref(name: &str, library_name: Option<&str>, operands: &[ElmNode], ctx: &EvaluationContext) -> EvalResult<Value> {
    let lookup_name = qualified_lookup_name(name, library_name);
    let statement = ctx
        .library
        .statements
        .iter()
        .find(|s| s.name == lookup_name && s.is_function())
        .ok_or_else(|| EvalError::UnresolvedInclude { name: name.to_string(), version: None })?;
    let params = statement.function_params.as_deref().unwrap_or_default();

    let mut inner = ctx.enter()?;
    for (param, operand) in params.iter().zip(operands) {
        let value = eval_node(operand, ctx)?;
        inner = inner.bind(param.name.clone(), value);
    }
    eval_node(&statement.expression, &inner)
}

fn eval_operator(op: ElmOperator, operands: &[ElmNode], ctx: &EvaluationContext) -> EvalResult<Value> {
    use ElmOperator::*;

    // Kleene short-circuit: `And`/`Or` settle as soon as one operand does,
    // without evaluating the other.
    if matches!(op, And | Or) {
        let a = eval_node(&operands[0], ctx)?;
        if op == And && a == Value::Boolean(false) {
            return Ok(Value::Boolean(false));
        }
        if op == Or && a == Value::Boolean(true) {
            return Ok(Value::Boolean(true));
        }
        let b = eval_node(&operands[1], ctx)?;
        return Ok(if op == And { operators::logical::and(&a, &b) } else { operators::logical::or(&a, &b) });
    }

    if op == Coalesce {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push(eval_node(operand, ctx)?);
        }
        return Ok(operators::terminology::coalesce(&values));
    }

    let mut args = Vec::with_capacity(operands.len());
    for operand in operands {
        args.push(eval_node(operand, ctx)?);
    }
    let a = args.first();
    let b = args.get(1);
    let c = args.get(2);

    match op {
        Add => operators::arithmetic::add(a.unwrap(), b.unwrap(), "Add"),
        Subtract => operators::arithmetic::subtract(a.unwrap(), b.unwrap(), "Subtract"),
        Multiply => operators::arithmetic::multiply(a.unwrap(), b.unwrap(), "Multiply"),
        Divide => operators::arithmetic::divide(a.unwrap(), b.unwrap()),
        TruncatedDivide => operators::arithmetic::truncated_divide(a.unwrap(), b.unwrap()),
        Modulo => operators::arithmetic::modulo(a.unwrap(), b.unwrap()),
        Power => operators::arithmetic::power(a.unwrap(), b.unwrap()),
        Negate => operators::arithmetic::negate(a.unwrap()),
        Predecessor => operators::arithmetic::predecessor(a.unwrap()),
        Successor => operators::arithmetic::successor(a.unwrap()),

        Equal => Ok(operators::comparison::equal(a.unwrap(), b.unwrap())),
        NotEqual => Ok(operators::comparison::not_equal(a.unwrap(), b.unwrap())),
        Equivalent => Ok(operators::comparison::equivalent(a.unwrap(), b.unwrap())),
        NotEquivalent => Ok(operators::comparison::not_equivalent(a.unwrap(), b.unwrap())),
        Less => operators::comparison::less(a.unwrap(), b.unwrap()),
        Greater => operators::comparison::greater(a.unwrap(), b.unwrap()),
        LessOrEqual => operators::comparison::less_or_equal(a.unwrap(), b.unwrap()),
        GreaterOrEqual => operators::comparison::greater_or_equal(a.unwrap(), b.unwrap()),

        Xor => Ok(operators::logical::xor(a.unwrap(), b.unwrap())),
        Not => Ok(operators::logical::not(a.unwrap())),
        Implies => Ok(operators::logical::implies(a.unwrap(), b.unwrap())),
        And | Or => unreachable!("handled above"),

        Union => Ok(operators::collection::union(a.unwrap(), b.unwrap())),
        Intersect => Ok(operators::collection::intersect(a.unwrap(), b.unwrap())),
        Except => Ok(operators::collection::except(a.unwrap(), b.unwrap())),
        Distinct => Ok(operators::collection::distinct(a.unwrap())),
        Flatten => Ok(operators::collection::flatten(a.unwrap())),
        First => Ok(operators::collection::first(a.unwrap())),
        Last => Ok(operators::collection::last(a.unwrap())),
        Tail => Ok(operators::collection::tail(a.unwrap())),
        Skip => Ok(operators::collection::skip(a.unwrap(), as_i64(b.unwrap()))),
        Take => Ok(operators::collection::take(a.unwrap(), as_i64(b.unwrap()))),
        Single => Ok(operators::collection::single(a.unwrap())),
        Count => Ok(operators::collection::count(a.unwrap())),
        Exists => Ok(operators::collection::exists(a.unwrap())),
        In => Ok(operators::collection::in_list(a.unwrap(), b.unwrap())),
        Contains => Ok(operators::collection::contains(a.unwrap(), b.unwrap())),
        SubsetOf => Ok(operators::collection::subset_of(a.unwrap(), b.unwrap())),
        SupersetOf => Ok(operators::collection::superset_of(a.unwrap(), b.unwrap())),
        Combine => Ok(operators::collection::combine(a.unwrap(), b.and_then(as_str_opt))),
        IsDistinct => Ok(operators::collection::is_distinct(a.unwrap())),
        Expand => Ok(a.unwrap().clone()),

        StartsWith => operators::string::starts_with(a.unwrap(), b.unwrap()),
        EndsWith => operators::string::ends_with(a.unwrap(), b.unwrap()),
        Matches => operators::string::matches(a.unwrap(), b.unwrap()),
        ReplaceMatches => operators::string::replace_matches(a.unwrap(), b.unwrap(), c.unwrap()),
        Replace => operators::string::replace(a.unwrap(), b.unwrap(), c.unwrap()),
        Length => match a.unwrap() {
            Value::List(_) | Value::Null => Ok(operators::collection::count(a.unwrap())),
            other => operators::string::length(other),
        },
        Substring => operators::string::substring(a.unwrap(), as_i64(b.unwrap()), c.map(as_i64)),
        Upper => operators::string::upper(a.unwrap()),
        Lower => operators::string::lower(a.unwrap()),
        Trim => operators::string::trim(a.unwrap()),
        Split => operators::string::split(a.unwrap(), b.unwrap()),
        Join => operators::string::join(a.unwrap(), b.unwrap()),
        IndexOf => operators::string::index_of(a.unwrap(), b.unwrap()),
        ToChars => operators::string::to_chars(a.unwrap()),
        Encode => operators::string::encode(a.unwrap(), b.unwrap()),
        Decode => operators::string::decode(a.unwrap(), b.unwrap()),
        Concatenate => operators::string::concatenate(&args),

        Abs => operators::arithmetic::abs(a.unwrap()),
        Ceiling => operators::arithmetic::ceiling(a.unwrap()),
        Floor => operators::arithmetic::floor(a.unwrap()),
        Round => operators::arithmetic::round(a.unwrap()),
        Truncate => operators::arithmetic::truncate(a.unwrap()),
        Sqrt => operators::arithmetic::sqrt(a.unwrap()),
        Ln => operators::arithmetic::ln(a.unwrap()),
        Log => operators::arithmetic::log(a.unwrap(), b.unwrap()),
        Exp => operators::arithmetic::exp(a.unwrap()),

        Today => Ok(ctx.today()),
        Now => Ok(ctx.now()),
        TimeOfDay => Ok(ctx.time_of_day()),
        DateFrom => operators::temporal::date_from(a.unwrap()),
        TimeFrom => operators::temporal::time_from(a.unwrap()),
        DurationBetween => eval_between(a.unwrap(), b.unwrap(), c),
        DifferenceBetween => eval_between(a.unwrap(), b.unwrap(), c),

        Is => Ok(operators::typeops::is_type(a.unwrap(), as_str(b.unwrap()))),
        As => Ok(operators::typeops::as_type(a.unwrap(), as_str(b.unwrap()))),
        ConvertsTo => Ok(converts_to(a.unwrap(), as_str(b.unwrap()))),
        ToBoolean => Ok(operators::typeops::to_boolean(a.unwrap())),
        ToDecimal => Ok(operators::typeops::to_decimal(a.unwrap())),
        ToInteger => Ok(operators::typeops::to_integer(a.unwrap())),
        ToLong => Ok(operators::typeops::to_long(a.unwrap())),
        ToString => Ok(operators::typeops::to_string(a.unwrap())),
        ToDate => Ok(operators::typeops::to_date(a.unwrap())),
        ToDateTime => Ok(operators::typeops::to_date_time(a.unwrap())),
        ToTime => Ok(operators::typeops::to_time(a.unwrap())),
        ToQuantity => Ok(operators::typeops::to_quantity(a.unwrap())),
        ToList => Ok(operators::typeops::to_list(a.unwrap())),

        ConvertQuantity => eval_convert_quantity(a.unwrap(), b.unwrap()),
        CanConvertQuantity => Ok(Value::Boolean(eval_convert_quantity(a.unwrap(), b.unwrap()).is_ok())),

        IntervalOverlaps => operators::interval::overlaps(a.unwrap(), b.unwrap()),
        IntervalDuring => operators::interval::during(a.unwrap(), b.unwrap()),
        IntervalBefore => operators::interval::before(a.unwrap(), b.unwrap()),
        IntervalAfter => operators::interval::after(a.unwrap(), b.unwrap()),
        IntervalStarts => operators::interval::starts(a.unwrap(), b.unwrap()),
        IntervalEnds => operators::interval::ends(a.unwrap(), b.unwrap()),
        IntervalWidth => operators::interval::width(a.unwrap()),
        IntervalContains => operators::interval::contains(a.unwrap(), b.unwrap()),
        IntervalIn => operators::interval::includes(b.unwrap(), a.unwrap()),
        Start => operators::interval::start(a.unwrap()),
        End => operators::interval::end(a.unwrap()),

        Sum => operators::aggregate::sum(a.unwrap()),
        Avg => operators::aggregate::avg(a.unwrap()),
        Median => operators::aggregate::median(a.unwrap()),
        Min => operators::aggregate::min(a.unwrap()),
        Max => operators::aggregate::max(a.unwrap()),
        StdDev => operators::aggregate::std_dev(a.unwrap()),
        Variance => operators::aggregate::variance(a.unwrap()),
        GeometricMean => operators::aggregate::geometric_mean(a.unwrap()),
        Product => operators::aggregate::product(a.unwrap()),
        AllTrue => operators::aggregate::all_true(a.unwrap()),
        AnyTrue => operators::aggregate::any_true(a.unwrap()),

        AgeInYears => operators::clinical::age_in_years(&patient_birth_date(ctx), a, ctx.today_date()),
        AgeInMonths => operators::clinical::age_in_months(&patient_birth_date(ctx), a, ctx.today_date()),
        CalculateAgeAt => operators::clinical::calculate_age_at(a.unwrap(), b.unwrap(), ctx.today_date()),

        InValueSet => operators::terminology::in_value_set(a.unwrap(), b.unwrap(), ctx.terminology.as_ref()),
        Subsumes => operators::terminology::subsumes(a.unwrap(), b.unwrap(), ctx.terminology.as_ref()),
        SubsumedBy => operators::terminology::subsumed_by(a.unwrap(), b.unwrap(), ctx.terminology.as_ref()),

        IsNull => Ok(operators::terminology::is_null(a.unwrap())),
        IsTrue => Ok(operators::terminology::is_true(a.unwrap())),
        IsFalse => Ok(operators::terminology::is_false(a.unwrap())),
        Coalesce => unreachable!("handled above"),
    }
}

/// `AgeInYears`/`AgeInMonths` with no birth-date operand read it from the
/// `Patient` resource the evaluation is scoped to (the implicit clinical
/// context), rather than requiring every call site to pass it.
fn patient_birth_date(ctx: &EvaluationContext) -> Value {
    match ctx.root.as_ref() {
        Value::Resource(json) => json
            .get("birthDate")
            .and_then(|v| v.as_str())
            .and_then(temporal_literal::parse_date_or_datetime)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Integer(i) => *i,
        Value::Long(l) => *l as i64,
        _ => 0,
    }
}

fn as_str(v: &Value) -> &str {
    match v {
        Value::String(s) => s.as_str(),
        _ => "",
    }
}

fn as_str_opt(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn converts_to(v: &Value, type_name: &str) -> Value {
    match type_name {
        "Boolean" => operators::typeops::converts_to_boolean(v),
        "Decimal" => operators::typeops::converts_to_decimal(v),
        "Integer" => operators::typeops::converts_to_integer(v),
        _ => Value::Boolean(operators::typeops::is_type(v, type_name) == Value::Boolean(true)),
    }
}

/// Dispatches `years`/`months`/`day` precision to the matching calendar or
/// elapsed helper in [`operators::temporal`]; an absent or unrecognized
/// precision falls back to elapsed day math, preserving the historical
/// 2-operand `DurationBetween(a, b)` behavior.
fn eval_between(a: &Value, b: &Value, precision: Option<&Value>) -> EvalResult<Value> {
    let (from, to) = match (a, b) {
        (Value::Date(from), Value::Date(to)) => (*from, *to),
        (Value::DateTime(from), Value::DateTime(to)) => (from.date, to.date),
        _ => return Err(EvalError::TypeMismatch { op: "DurationBetween".into(), expected: "Date or DateTime".into(), actual: a.kind() }),
    };
    let count = match precision.and_then(as_str_opt) {
        Some("year") => operators::temporal::years_between(&from, &to),
        Some("month") => operators::temporal::months_between(&from, &to),
        _ => operators::temporal::days_between(&from, &to),
    };
    Ok(Value::Integer(count))
}

fn eval_convert_quantity(a: &Value, b: &Value) -> EvalResult<Value> {
    match (a, b) {
        (Value::Quantity(q), Value::String(unit)) => {
            q.convert_to(unit).map(Value::Quantity).map_err(|_| EvalError::TypeMismatch {
                op: "ConvertQuantity".into(),
                expected: "compatible unit".into(),
                actual: a.kind(),
            })
        }
        _ => Err(EvalError::TypeMismatch { op: "ConvertQuantity".into(), expected: "Quantity, String".into(), actual: a.kind() }),
    }
}
