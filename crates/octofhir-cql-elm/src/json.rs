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

//! ELM JSON (de)serialization, matching the wire shape real ELM tooling
//! expects: a `"library"` envelope, camelCase declaration lists, a nested
//! `"statements": {"def": [...]}`, and a `"type"` discriminant on every
//! expression node. This is deliberately hand-rolled rather
//! than derived `Serialize`/`Deserialize` on [`ElmNode`] itself: the
//! generic [`ElmNode::Operator`] shape doesn't line up with the one-tag-
//! per-kind shape the wire format needs, so this module is the only place
//! that translation happens.

use crate::library::*;
use crate::node::*;
use octofhir_cql_core::{Code, Concept, Quantity, Ratio, Value};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value as Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElmJsonError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong shape")]
    WrongShape(&'static str),
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
}

type JsonResult<T> = Result<T, ElmJsonError>;

pub fn to_json(library: &ElmLibrary) -> Json {
    json!({ "library": library_to_json(library) })
}

pub fn from_json(value: &Json) -> JsonResult<ElmLibrary> {
    let library = value.get("library").ok_or(ElmJsonError::MissingField("library"))?;
    library_from_json(library)
}

fn library_to_json(lib: &ElmLibrary) -> Json {
    let mut root = Map::new();
    if let Some(id) = &lib.identifier {
        root.insert(
            "identifier".to_string(),
            json!({ "id": id.id, "version": id.version }),
        );
    }
    root.insert(
        "usings".to_string(),
        json!(lib.usings.iter().map(|u| json!({"model": u.model, "version": u.version})).collect::<Vec<_>>()),
    );
    root.insert(
        "includes".to_string(),
        json!(lib
            .includes
            .iter()
            .map(|i| json!({"name": i.name, "version": i.version, "alias": i.alias}))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "parameters".to_string(),
        json!(lib
            .parameters
            .iter()
            .map(|p| json!({
                "name": p.name,
                "declaredType": p.declared_type,
                "default": p.default.as_ref().map(node_to_json),
            }))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "codeSystems".to_string(),
        json!(lib
            .code_systems
            .iter()
            .map(|c| json!({"name": c.name, "id": c.id, "version": c.version}))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "valueSets".to_string(),
        json!(lib
            .valuesets
            .iter()
            .map(|v| json!({"name": v.name, "id": v.id, "version": v.version}))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "codes".to_string(),
        json!(lib
            .codes
            .iter()
            .map(|c| json!({"name": c.name, "code": c.code, "system": c.system, "display": c.display}))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "concepts".to_string(),
        json!(lib
            .concepts
            .iter()
            .map(|c| json!({"name": c.name, "codes": c.codes, "display": c.display}))
            .collect::<Vec<_>>()),
    );
    root.insert(
        "contexts".to_string(),
        json!(lib.contexts.iter().map(|c| json!({"name": c.name})).collect::<Vec<_>>()),
    );
    let defs: Vec<Json> = lib
        .statements
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "context": s.context,
                "isPublic": s.is_public,
                "operand": s.function_params.as_ref().map(|params| {
                    params.iter().map(|p| json!({"name": p.name, "operandType": p.declared_type})).collect::<Vec<_>>()
                }),
                "expression": node_to_json(&s.expression),
            })
        })
        .collect();
    root.insert("statements".to_string(), json!({ "def": defs }));
    Json::Object(root)
}

fn library_from_json(value: &Json) -> JsonResult<ElmLibrary> {
    let mut lib = ElmLibrary::new();

    if let Some(id) = value.get("identifier") {
        lib.identifier = Some(ElmLibraryIdentifier {
            id: str_field(id, "id")?,
            version: opt_str_field(id, "version"),
        });
    }
    for u in array_field(value, "usings")? {
        lib.usings.push(ElmUsing { model: str_field(u, "model")?, version: opt_str_field(u, "version") });
    }
    for i in array_field(value, "includes")? {
        lib.includes.push(ElmInclude {
            name: str_field(i, "name")?,
            version: opt_str_field(i, "version"),
            alias: str_field(i, "alias")?,
        });
    }
    for p in array_field(value, "parameters")? {
        lib.parameters.push(ElmParameterDef {
            name: str_field(p, "name")?,
            declared_type: opt_str_field(p, "declaredType"),
            default: match p.get("default") {
                Some(d) if !d.is_null() => Some(node_from_json(d)?),
                _ => None,
            },
        });
    }
    for c in array_field(value, "codeSystems")? {
        lib.code_systems.push(ElmCodeSystemDef {
            name: str_field(c, "name")?,
            id: str_field(c, "id")?,
            version: opt_str_field(c, "version"),
        });
    }
    for v in array_field(value, "valueSets")? {
        lib.valuesets.push(ElmValuesetDef {
            name: str_field(v, "name")?,
            id: str_field(v, "id")?,
            version: opt_str_field(v, "version"),
        });
    }
    for c in array_field(value, "codes")? {
        lib.codes.push(ElmCodeDef {
            name: str_field(c, "name")?,
            code: str_field(c, "code")?,
            system: str_field(c, "system")?,
            display: opt_str_field(c, "display"),
        });
    }
    for c in array_field(value, "concepts")? {
        lib.concepts.push(ElmConceptDef {
            name: str_field(c, "name")?,
            codes: array_field(c, "codes")?.iter().filter_map(|s| s.as_str().map(String::from)).collect(),
            display: opt_str_field(c, "display"),
        });
    }
    for c in array_field(value, "contexts")? {
        lib.contexts.push(ElmContextDef { name: str_field(c, "name")? });
    }

    let defs = value
        .get("statements")
        .and_then(|s| s.get("def"))
        .and_then(|d| d.as_array())
        .ok_or(ElmJsonError::MissingField("statements.def"))?;
    for def in defs {
        let function_params = match def.get("operand") {
            Some(Json::Array(items)) => Some(
                items
                    .iter()
                    .map(|p| {
                        Ok(ElmFunctionParameter {
                            name: str_field(p, "name")?,
                            declared_type: opt_str_field(p, "operandType"),
                        })
                    })
                    .collect::<JsonResult<Vec<_>>>()?,
            ),
            _ => None,
        };
        lib.statements.push(ElmStatement {
            name: str_field(def, "name")?,
            context: opt_str_field(def, "context").unwrap_or_else(|| "Patient".to_string()),
            is_public: def.get("isPublic").and_then(|b| b.as_bool()).unwrap_or(true),
            function_params,
            expression: node_from_json(def.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?,
        });
    }

    Ok(lib)
}

fn node_to_json(node: &ElmNode) -> Json {
    match node {
        ElmNode::Literal(value) => json!({"type": "Literal", "valueType": value_type_name(value), "value": value_to_json(value)}),
        ElmNode::ExpressionRef { name, library_name } => {
            json!({"type": "ExpressionRef", "name": name, "libraryName": library_name})
        }
        ElmNode::ParameterRef(name) => json!({"type": "ParameterRef", "name": name}),
        ElmNode::CodeSystemRef(name) => json!({"type": "CodeSystemRef", "name": name}),
        ElmNode::ValuesetRef(name) => json!({"type": "ValueSetRef", "name": name}),
        ElmNode::CodeRef(name) => json!({"type": "CodeRef", "name": name}),
        ElmNode::ConceptRef(name) => json!({"type": "ConceptRef", "name": name}),
        ElmNode::OperandRef(name) => json!({"type": "OperandRef", "name": name}),
        ElmNode::Property { source, path } => {
            json!({"type": "Property", "source": node_to_json(source), "path": path})
        }
        ElmNode::Indexer { source, index } => {
            json!({"type": "Indexer", "operand": [node_to_json(source), node_to_json(index)]})
        }
        ElmNode::Operator { op, operands } => {
            let mut obj = Map::new();
            obj.insert("type".to_string(), json!(operator_name(*op)));
            obj.insert("operand".to_string(), json!(operands.iter().map(node_to_json).collect::<Vec<_>>()));
            Json::Object(obj)
        }
        ElmNode::If { condition, then_branch, else_branch } => json!({
            "type": "If",
            "condition": node_to_json(condition),
            "then": node_to_json(then_branch),
            "else": node_to_json(else_branch),
        }),
        ElmNode::Case { comparand, items, else_branch } => json!({
            "type": "Case",
            "comparand": comparand.as_ref().map(|c| node_to_json(c)),
            "caseItem": items.iter().map(|i| json!({"when": node_to_json(&i.when), "then": node_to_json(&i.then)})).collect::<Vec<_>>(),
            "else": node_to_json(else_branch),
        }),
        ElmNode::Tuple { elements } => json!({
            "type": "Tuple",
            "element": elements.iter().map(|(name, v)| json!({"name": name, "value": node_to_json(v)})).collect::<Vec<_>>(),
        }),
        ElmNode::List { element_type, elements } => json!({
            "type": "List",
            "elementType": element_type,
            "element": elements.iter().map(node_to_json).collect::<Vec<_>>(),
        }),
        ElmNode::Interval { low, high, low_closed, high_closed } => json!({
            "type": "Interval",
            "low": node_to_json(low),
            "high": node_to_json(high),
            "lowClosed": low_closed,
            "highClosed": high_closed,
        }),
        ElmNode::Retrieve(retrieve) => json!({
            "type": "Retrieve",
            "dataType": retrieve.resource_type,
            "codes": retrieve.code_filter.as_ref().map(|f| node_to_json(f)),
            "codeProperty": retrieve.code_path,
        }),
        ElmNode::Query(query) => query_to_json(query),
        ElmNode::FunctionRef { name, library_name, operands } => json!({
            "type": "FunctionRef",
            "name": name,
            "libraryName": library_name,
            "operand": operands.iter().map(node_to_json).collect::<Vec<_>>(),
        }),
        ElmNode::ExternalFunctionRef { name, operands } => json!({
            "type": "ExternalFunctionRef",
            "name": name,
            "operand": operands.iter().map(node_to_json).collect::<Vec<_>>(),
        }),
    }
}

fn query_to_json(query: &ElmQuery) -> Json {
    json!({
        "type": "Query",
        "source": query.sources.iter().map(|s| json!({"alias": s.alias, "expression": node_to_json(&s.expression)})).collect::<Vec<_>>(),
        "relationship": query.relationships.iter().map(|r| json!({
            "type": if r.negate { "Without" } else { "With" },
            "alias": r.alias,
            "expression": node_to_json(&r.source),
            "suchThat": node_to_json(&r.condition),
        })).collect::<Vec<_>>(),
        "let": query.lets.iter().map(|l| json!({"identifier": l.name, "expression": node_to_json(&l.expression)})).collect::<Vec<_>>(),
        "where": query.where_clause.as_ref().map(|w| node_to_json(w)),
        "return": query.return_clause.as_ref().map(|r| json!({"distinct": query.return_distinct, "expression": node_to_json(r)})),
        "aggregate": query.aggregate.as_ref().map(|a| json!({
            "identifier": a.result_alias,
            "starting": a.starting.as_ref().map(|s| node_to_json(s)),
            "expression": node_to_json(&a.body),
        })),
        "sort": query.sort.iter().map(|s| json!({
            "direction": match s.direction { ElmSortDirection::Ascending => "asc", ElmSortDirection::Descending => "desc" },
            "by": node_to_json(&s.expression),
        })).collect::<Vec<_>>(),
    })
}

fn node_from_json(value: &Json) -> JsonResult<ElmNode> {
    let node_type = value.get("type").and_then(|t| t.as_str()).ok_or(ElmJsonError::MissingField("type"))?;
    Ok(match node_type {
        "Literal" => {
            let raw = value.get("value").ok_or(ElmJsonError::MissingField("value"))?;
            let value_type = opt_str_field(value, "valueType");
            ElmNode::Literal(value_from_json_typed(raw, value_type.as_deref())?)
        }
        "ExpressionRef" => ElmNode::ExpressionRef { name: str_field(value, "name")?, library_name: opt_str_field(value, "libraryName") },
        "ParameterRef" => ElmNode::ParameterRef(str_field(value, "name")?),
        "CodeSystemRef" => ElmNode::CodeSystemRef(str_field(value, "name")?),
        "ValueSetRef" => ElmNode::ValuesetRef(str_field(value, "name")?),
        "CodeRef" => ElmNode::CodeRef(str_field(value, "name")?),
        "ConceptRef" => ElmNode::ConceptRef(str_field(value, "name")?),
        "OperandRef" => ElmNode::OperandRef(str_field(value, "name")?),
        "Property" => ElmNode::Property {
            source: Box::new(node_from_json(value.get("source").ok_or(ElmJsonError::MissingField("source"))?)?),
            path: str_field(value, "path")?,
        },
        "Indexer" => {
            let operands = array_field(value, "operand")?;
            if operands.len() != 2 {
                return Err(ElmJsonError::WrongShape("operand"));
            }
            ElmNode::Indexer { source: Box::new(node_from_json(&operands[0])?), index: Box::new(node_from_json(&operands[1])?) }
        }
        "If" => ElmNode::If {
            condition: Box::new(node_from_json(value.get("condition").ok_or(ElmJsonError::MissingField("condition"))?)?),
            then_branch: Box::new(node_from_json(value.get("then").ok_or(ElmJsonError::MissingField("then"))?)?),
            else_branch: Box::new(node_from_json(value.get("else").ok_or(ElmJsonError::MissingField("else"))?)?),
        },
        "Case" => {
            let comparand = match value.get("comparand") {
                Some(c) if !c.is_null() => Some(Box::new(node_from_json(c)?)),
                _ => None,
            };
            let items = array_field(value, "caseItem")?
                .iter()
                .map(|i| {
                    Ok(ElmCaseItem {
                        when: node_from_json(i.get("when").ok_or(ElmJsonError::MissingField("when"))?)?,
                        then: node_from_json(i.get("then").ok_or(ElmJsonError::MissingField("then"))?)?,
                    })
                })
                .collect::<JsonResult<Vec<_>>>()?;
            ElmNode::Case {
                comparand,
                items,
                else_branch: Box::new(node_from_json(value.get("else").ok_or(ElmJsonError::MissingField("else"))?)?),
            }
        }
        "Tuple" => ElmNode::Tuple {
            elements: array_field(value, "element")?
                .iter()
                .map(|e| Ok((str_field(e, "name")?, node_from_json(e.get("value").ok_or(ElmJsonError::MissingField("value"))?)?)))
                .collect::<JsonResult<Vec<_>>>()?,
        },
        "List" => ElmNode::List {
            element_type: opt_str_field(value, "elementType"),
            elements: array_field(value, "element")?.iter().map(node_from_json).collect::<JsonResult<Vec<_>>>()?,
        },
        "Interval" => ElmNode::Interval {
            low: Box::new(node_from_json(value.get("low").ok_or(ElmJsonError::MissingField("low"))?)?),
            high: Box::new(node_from_json(value.get("high").ok_or(ElmJsonError::MissingField("high"))?)?),
            low_closed: value.get("lowClosed").and_then(|b| b.as_bool()).unwrap_or(true),
            high_closed: value.get("highClosed").and_then(|b| b.as_bool()).unwrap_or(true),
        },
        "Retrieve" => ElmNode::Retrieve(Box::new(ElmRetrieve {
            resource_type: str_field(value, "dataType")?,
            code_filter: match value.get("codes") {
                Some(c) if !c.is_null() => Some(Box::new(node_from_json(c)?)),
                _ => None,
            },
            code_path: opt_str_field(value, "codeProperty"),
            date_filter: None,
        })),
        "Query" => query_from_json(value)?,
        "FunctionRef" => ElmNode::FunctionRef {
            name: str_field(value, "name")?,
            library_name: opt_str_field(value, "libraryName"),
            operands: array_field(value, "operand")?.iter().map(node_from_json).collect::<JsonResult<Vec<_>>>()?,
        },
        "ExternalFunctionRef" => ElmNode::ExternalFunctionRef {
            name: str_field(value, "name")?,
            operands: array_field(value, "operand")?.iter().map(node_from_json).collect::<JsonResult<Vec<_>>>()?,
        },
        other => match operator_from_name(other) {
            Some(op) => ElmNode::Operator {
                op,
                operands: array_field(value, "operand")?.iter().map(node_from_json).collect::<JsonResult<Vec<_>>>()?,
            },
            None => return Err(ElmJsonError::UnknownNodeType(other.to_string())),
        },
    })
}

fn query_from_json(value: &Json) -> JsonResult<ElmNode> {
    let sources = array_field(value, "source")?
        .iter()
        .map(|s| {
            Ok(ElmAliasedSource {
                alias: str_field(s, "alias")?,
                expression: node_from_json(s.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?,
            })
        })
        .collect::<JsonResult<Vec<_>>>()?;
    let relationships = array_field(value, "relationship")?
        .iter()
        .map(|r| {
            Ok(ElmRelationship {
                negate: r.get("type").and_then(|t| t.as_str()) == Some("Without"),
                alias: str_field(r, "alias")?,
                source: node_from_json(r.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?,
                condition: node_from_json(r.get("suchThat").ok_or(ElmJsonError::MissingField("suchThat"))?)?,
            })
        })
        .collect::<JsonResult<Vec<_>>>()?;
    let lets = array_field(value, "let")?
        .iter()
        .map(|l| {
            Ok(ElmLetClause {
                name: str_field(l, "identifier")?,
                expression: node_from_json(l.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?,
            })
        })
        .collect::<JsonResult<Vec<_>>>()?;
    let where_clause = match value.get("where") {
        Some(w) if !w.is_null() => Some(node_from_json(w)?),
        _ => None,
    };
    let (return_clause, return_distinct) = match value.get("return") {
        Some(r) if !r.is_null() => (
            Some(node_from_json(r.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?),
            r.get("distinct").and_then(|b| b.as_bool()).unwrap_or(false),
        ),
        _ => (None, false),
    };
    let aggregate = match value.get("aggregate") {
        Some(a) if !a.is_null() => Some(ElmAggregateClause {
            result_alias: str_field(a, "identifier")?,
            starting: match a.get("starting") {
                Some(s) if !s.is_null() => Some(Box::new(node_from_json(s)?)),
                _ => None,
            },
            body: Box::new(node_from_json(a.get("expression").ok_or(ElmJsonError::MissingField("expression"))?)?),
        }),
        _ => None,
    };
    let sort = array_field(value, "sort")?
        .iter()
        .map(|s| {
            Ok(ElmSortItem {
                expression: node_from_json(s.get("by").ok_or(ElmJsonError::MissingField("by"))?)?,
                direction: match s.get("direction").and_then(|d| d.as_str()) {
                    Some("desc") => ElmSortDirection::Descending,
                    _ => ElmSortDirection::Ascending,
                },
            })
        })
        .collect::<JsonResult<Vec<_>>>()?;

    Ok(ElmNode::Query(Box::new(ElmQuery {
        sources,
        relationships,
        lets,
        where_clause,
        return_clause,
        return_distinct,
        aggregate,
        sort,
    })))
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Long(l) => json!(l.to_string()),
        Value::Decimal(d) => json!(d.to_string()),
        Value::String(s) => json!(s),
        Value::Date(d) => json!(d.to_string()),
        Value::DateTime(dt) => json!(dt.to_string()),
        Value::Time(t) => json!(t.to_string()),
        Value::Quantity(q) => json!({"value": q.value.to_string(), "unit": q.unit}),
        Value::Ratio(r) => json!({
            "numerator": {"value": r.numerator.value.to_string(), "unit": r.numerator.unit},
            "denominator": {"value": r.denominator.value.to_string(), "unit": r.denominator.unit},
        }),
        Value::Code(c) => json!({"system": c.system, "code": c.code, "version": c.version, "display": c.display}),
        Value::Concept(c) => json!({"text": c.text, "coding": c.coding.iter().map(|c| json!({"system": c.system, "code": c.code})).collect::<Vec<_>>()}),
        Value::Interval(_) | Value::Tuple(_) | Value::List(_) | Value::Resource(_) => {
            serde_json::to_value(value).unwrap_or(Json::Null)
        }
    }
}

fn parse_quantity(value: &Json) -> Quantity {
    let decimal = value.get("value").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).unwrap_or_default();
    let unit = value.get("unit").and_then(|u| u.as_str()).map(String::from);
    Quantity::new(decimal, unit)
}

/// `Long`, `Decimal`, `Date`, `DateTime` and `Time` all round-trip through a
/// JSON string, so the `"valueType"` tag written alongside a `Literal` is
/// what tells them apart from a genuine `String` value on the way back in.
fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Any",
        Value::Boolean(_) => "Boolean",
        Value::Integer(_) => "Integer",
        Value::Long(_) => "Long",
        Value::Decimal(_) => "Decimal",
        Value::String(_) => "String",
        Value::Date(_) => "Date",
        Value::DateTime(_) => "DateTime",
        Value::Time(_) => "Time",
        Value::Quantity(_) => "Quantity",
        Value::Ratio(_) => "Ratio",
        Value::Code(_) => "Code",
        Value::Concept(_) => "Concept",
        Value::Interval(_) => "Interval",
        Value::Tuple(_) => "Tuple",
        Value::List(_) => "List",
        Value::Resource(_) => "Resource",
    }
}

fn value_from_json_typed(value: &Json, value_type: Option<&str>) -> JsonResult<Value> {
    if let (Json::String(s), Some(tag)) = (value, value_type) {
        return Ok(match tag {
            "Long" => Value::Long(s.parse().unwrap_or_default()),
            "Decimal" => Value::Decimal(s.parse().unwrap_or_default()),
            "Date" => Value::Date(crate::lower::lower::parse_precision_date(s)),
            "DateTime" => Value::DateTime(crate::lower::lower::parse_precision_datetime(s)),
            "Time" => Value::Time(crate::lower::lower::parse_precision_time(s)),
            _ => Value::String(s.clone()),
        });
    }
    value_from_json(value)
}

fn value_from_json(value: &Json) -> JsonResult<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Decimal(n.as_f64().and_then(Decimal::from_f64_retain).unwrap_or_default())
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Object(obj) if obj.contains_key("value") && obj.contains_key("unit") => Value::Quantity(parse_quantity(value)),
        Json::Object(obj) if obj.contains_key("numerator") && obj.contains_key("denominator") => Value::Ratio(Ratio {
            numerator: parse_quantity(&value["numerator"]),
            denominator: parse_quantity(&value["denominator"]),
        }),
        Json::Object(obj) if obj.contains_key("system") && obj.contains_key("code") => Value::Code(Code {
            system: str_field(value, "system")?,
            code: str_field(value, "code")?,
            version: opt_str_field(value, "version"),
            display: opt_str_field(value, "display"),
        }),
        Json::Object(obj) if obj.contains_key("text") && obj.contains_key("coding") => Value::Concept(Concept {
            text: opt_str_field(value, "text"),
            coding: array_field(value, "coding")?
                .iter()
                .map(|c| Ok(Code { system: str_field(c, "system")?, code: str_field(c, "code")?, version: None, display: None }))
                .collect::<JsonResult<Vec<_>>>()?,
        }),
        other => serde_json::from_value(other.clone()).map_err(|_| ElmJsonError::WrongShape("value"))?,
    })
}

fn operator_name(op: ElmOperator) -> &'static str {
    use ElmOperator::*;
    match op {
        Add => "Add",
        Subtract => "Subtract",
        Multiply => "Multiply",
        Divide => "Divide",
        TruncatedDivide => "TruncatedDivide",
        Modulo => "Modulo",
        Power => "Power",
        Negate => "Negate",
        Predecessor => "Predecessor",
        Successor => "Successor",
        Equal => "Equal",
        NotEqual => "NotEqual",
        Equivalent => "Equivalent",
        NotEquivalent => "NotEquivalent",
        Less => "Less",
        Greater => "Greater",
        LessOrEqual => "LessOrEqual",
        GreaterOrEqual => "GreaterOrEqual",
        And => "And",
        Or => "Or",
        Xor => "Xor",
        Not => "Not",
        Implies => "Implies",
        Union => "Union",
        Intersect => "Intersect",
        Except => "Except",
        Distinct => "Distinct",
        Flatten => "Flatten",
        First => "First",
        Last => "Last",
        Tail => "Tail",
        Skip => "Skip",
        Take => "Take",
        Single => "SingletonFrom",
        Count => "Count",
        Exists => "Exists",
        In => "In",
        Contains => "Contains",
        SubsetOf => "IncludedIn",
        SupersetOf => "Includes",
        Combine => "Collapse",
        IsDistinct => "IsDistinct",
        Expand => "Expand",
        StartsWith => "StartsWith",
        EndsWith => "EndsWith",
        Matches => "Matches",
        ReplaceMatches => "ReplaceMatches",
        Replace => "Replace",
        Length => "Length",
        Substring => "Substring",
        Upper => "Upper",
        Lower => "Lower",
        Trim => "Trim",
        Split => "Split",
        Join => "Combine",
        IndexOf => "IndexOf",
        ToChars => "ToChars",
        Encode => "Encode",
        Decode => "Decode",
        Concatenate => "Concatenate",
        Abs => "Abs",
        Ceiling => "Ceiling",
        Floor => "Floor",
        Round => "Round",
        Truncate => "Truncate",
        Sqrt => "Sqrt",
        Ln => "Ln",
        Log => "Log",
        Exp => "Exp",
        Today => "Today",
        Now => "Now",
        TimeOfDay => "TimeOfDay",
        DateFrom => "DateFrom",
        TimeFrom => "TimeFrom",
        DurationBetween => "DurationBetween",
        DifferenceBetween => "DifferenceBetween",
        Is => "Is",
        As => "As",
        ConvertsTo => "ConvertsTo",
        ToBoolean => "ToBoolean",
        ToDecimal => "ToDecimal",
        ToInteger => "ToInteger",
        ToLong => "ToLong",
        ToString => "ToString",
        ToDate => "ToDate",
        ToDateTime => "ToDateTime",
        ToTime => "ToTime",
        ToQuantity => "ToQuantity",
        ToList => "ToList",
        ConvertQuantity => "ConvertQuantity",
        CanConvertQuantity => "CanConvertQuantity",
        IntervalOverlaps => "Overlaps",
        IntervalDuring => "During",
        IntervalBefore => "Before",
        IntervalAfter => "After",
        IntervalStarts => "Starts",
        IntervalEnds => "Ends",
        IntervalWidth => "Width",
        IntervalContains => "Includes",
        IntervalIn => "In",
        Start => "Start",
        End => "End",
        Sum => "Sum",
        Avg => "Avg",
        Median => "Median",
        Min => "Min",
        Max => "Max",
        StdDev => "StdDev",
        Variance => "Variance",
        GeometricMean => "GeometricMean",
        Product => "Product",
        AllTrue => "AllTrue",
        AnyTrue => "AnyTrue",
        AgeInYears => "AgeInYears",
        AgeInMonths => "AgeInMonths",
        CalculateAgeAt => "CalculateAgeAt",
        InValueSet => "InValueSet",
        Subsumes => "Subsumes",
        SubsumedBy => "SubsumedBy",
        IsNull => "IsNull",
        IsTrue => "IsTrue",
        IsFalse => "IsFalse",
        Coalesce => "Coalesce",
    }
}

fn operator_from_name(name: &str) -> Option<ElmOperator> {
    use ElmOperator::*;
    Some(match name {
        "Add" => Add,
        "Subtract" => Subtract,
        "Multiply" => Multiply,
        "Divide" => Divide,
        "TruncatedDivide" => TruncatedDivide,
        "Modulo" => Modulo,
        "Power" => Power,
        "Negate" => Negate,
        "Predecessor" => Predecessor,
        "Successor" => Successor,
        "Equal" => Equal,
        "NotEqual" => NotEqual,
        "Equivalent" => Equivalent,
        "NotEquivalent" => NotEquivalent,
        "Less" => Less,
        "Greater" => Greater,
        "LessOrEqual" => LessOrEqual,
        "GreaterOrEqual" => GreaterOrEqual,
        "And" => And,
        "Or" => Or,
        "Xor" => Xor,
        "Not" => Not,
        "Implies" => Implies,
        "Union" => Union,
        "Intersect" => Intersect,
        "Except" => Except,
        "Distinct" => Distinct,
        "Flatten" => Flatten,
        "First" => First,
        "Last" => Last,
        "Tail" => Tail,
        "Skip" => Skip,
        "Take" => Take,
        "SingletonFrom" => Single,
        "Count" => Count,
        "Exists" => Exists,
        "In" => In,
        "Contains" => Contains,
        "IncludedIn" => SubsetOf,
        "Includes" => SupersetOf,
        "Collapse" => Combine,
        "IsDistinct" => IsDistinct,
        "Expand" => Expand,
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
        "IndexOf" => IndexOf,
        "ToChars" => ToChars,
        "Encode" => Encode,
        "Decode" => Decode,
        "Combine" => Join,
        "Concatenate" => Concatenate,
        "Abs" => Abs,
        "Ceiling" => Ceiling,
        "Floor" => Floor,
        "Round" => Round,
        "Truncate" => Truncate,
        "Sqrt" => Sqrt,
        "Ln" => Ln,
        "Log" => Log,
        "Exp" => Exp,
        "Today" => Today,
        "Now" => Now,
        "TimeOfDay" => TimeOfDay,
        "DateFrom" => DateFrom,
        "TimeFrom" => TimeFrom,
        "DurationBetween" => DurationBetween,
        "DifferenceBetween" => DifferenceBetween,
        "Is" => Is,
        "As" => As,
        "ConvertsTo" => ConvertsTo,
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

fn str_field(value: &Json, name: &'static str) -> JsonResult<String> {
    value.get(name).and_then(|v| v.as_str()).map(String::from).ok_or(ElmJsonError::MissingField(name))
}

fn opt_str_field(value: &Json, name: &'static str) -> Option<String> {
    value.get(name).and_then(|v| v.as_str()).map(String::from)
}

fn array_field(value: &Json, name: &'static str) -> JsonResult<Vec<Json>> {
    match value.get(name) {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => Ok(items.clone()),
        Some(_) => Err(ElmJsonError::WrongShape(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ElmLibrary;

    #[test]
    fn round_trips_an_arithmetic_statement() {
        let mut lib = ElmLibrary::new();
        lib.statements.push(ElmStatement {
            name: "Seven".to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::binary(ElmOperator::Add, ElmNode::Literal(Value::Integer(1)), ElmNode::Literal(Value::Integer(6))),
        });
        let json = to_json(&lib);
        let restored = from_json(&json).expect("round trip");
        assert_eq!(restored.statement("Seven").unwrap().expression, lib.statement("Seven").unwrap().expression);
    }

    #[test]
    fn round_trips_a_retrieve_with_code_filter() {
        let mut lib = ElmLibrary::new();
        lib.statements.push(ElmStatement {
            name: "Diabetes".to_string(),
            context: "Patient".to_string(),
            is_public: true,
            function_params: None,
            expression: ElmNode::Retrieve(Box::new(ElmRetrieve {
                resource_type: "Condition".to_string(),
                code_filter: Some(Box::new(ElmNode::ValuesetRef("DM2".to_string()))),
                code_path: Some("code".to_string()),
                date_filter: None,
            })),
        });
        let json = to_json(&lib);
        let restored = from_json(&json).expect("round trip");
        assert_eq!(restored.statement("Diabetes").unwrap().expression, lib.statement("Diabetes").unwrap().expression);
    }
}
