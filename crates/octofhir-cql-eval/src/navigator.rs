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

//! FHIR resource navigation. A `Resource` is carried
//! opaquely as [`serde_json::Value`] by [`octofhir_cql_core::Value`]; this
//! module is the only place that looks inside it.
//!
//! Navigation always yields a list: an element that happens to be 0..1 just
//! produces a list of length 0 or 1, it is never unwrapped to a bare scalar
//! here — the caller (the `Property` evaluator) decides whether to keep it
//! as a list or collapse a singleton.

use crate::datasource::DataSource;
use octofhir_cql_core::{Code, Value};

/// Resolve `path` against a single `json` node, one navigation step.
/// Choice-typed elements (`value[x]` in the underlying FHIR definition) are
/// not distinguished here by type tables — CQL paths already spell out the
/// concrete suffix (e.g. `valueQuantity`), so a direct field lookup plus a
/// case-insensitive `value`-prefix fallback covers both spellings.
pub fn navigate_property(json: &serde_json::Value, path: &str) -> Vec<serde_json::Value> {
    match json {
        serde_json::Value::Object(map) => {
            if let Some(v) = map.get(path) {
                return flatten_one(v);
            }
            if let Some(rest) = path.strip_prefix("value") {
                for (key, v) in map.iter() {
                    if key.len() > 5
                        && key.starts_with("value")
                        && key[5..].eq_ignore_ascii_case(rest)
                    {
                        return flatten_one(v);
                    }
                }
            }
            Vec::new()
        }
        serde_json::Value::Array(items) => items
            .iter()
            .flat_map(|item| navigate_property(item, path))
            .collect(),
        _ => Vec::new(),
    }
}

fn flatten_one(v: &serde_json::Value) -> Vec<serde_json::Value> {
    match v {
        serde_json::Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// `extension(url)`: walk `extension[*]`, keep the ones whose `url` field
/// matches exactly.
pub fn extension(json: &serde_json::Value, url: &str) -> Vec<serde_json::Value> {
    navigate_property(json, "extension")
        .into_iter()
        .filter(|ext| {
            ext.get("url").and_then(|u| u.as_str()) == Some(url)
        })
        .collect()
}

/// `ofType(T)`: resources are filtered by `resourceType`; everything else
/// is kept only when its JSON shape is consistent with `type_name` being a
/// primitive name (best-effort, since plain JSON carries no static type).
pub fn of_type(values: &[Value], type_name: &str) -> Vec<Value> {
    values
        .iter()
        .filter(|v| match v {
            Value::Resource(json) => json
                .get("resourceType")
                .and_then(|t| t.as_str())
                .map(|t| t == type_name)
                .unwrap_or(false),
            Value::Boolean(_) => type_name.eq_ignore_ascii_case("Boolean"),
            Value::Integer(_) => type_name.eq_ignore_ascii_case("Integer"),
            Value::Decimal(_) => type_name.eq_ignore_ascii_case("Decimal"),
            Value::String(_) => type_name.eq_ignore_ascii_case("String"),
            Value::Date(_) => type_name.eq_ignore_ascii_case("Date"),
            Value::DateTime(_) => type_name.eq_ignore_ascii_case("DateTime"),
            Value::Time(_) => type_name.eq_ignore_ascii_case("Time"),
            Value::Quantity(_) => type_name.eq_ignore_ascii_case("Quantity"),
            Value::Code(_) => type_name.eq_ignore_ascii_case("Code"),
            _ => false,
        })
        .cloned()
        .collect()
}

/// `resolve()` on a `Reference`: read the `reference` field, delegate to
/// the active [`DataSource`].
pub fn resolve(json: &serde_json::Value, data_source: &dyn DataSource) -> Option<Value> {
    let reference = json.get("reference")?.as_str()?;
    data_source.resolve_reference(reference)
}

/// Pull every `Coding` out of a value regardless of whether it is a single
/// `Coding`, a `CodeableConcept`, or a bare `code` primitive with a
/// `system` sibling — used by the retrieve layer's code filter to compare
/// a resource's codings against an expanded value set.
pub fn codings_of(json: &serde_json::Value) -> Vec<Code> {
    if let Some(coding) = json.get("coding").and_then(|c| c.as_array()) {
        return coding.iter().filter_map(json_to_code).collect();
    }
    if json.get("system").is_some() && json.get("code").is_some() {
        return json_to_code(json).into_iter().collect();
    }
    Vec::new()
}

fn json_to_code(json: &serde_json::Value) -> Option<Code> {
    let system = json.get("system")?.as_str()?.to_string();
    let code = json.get("code")?.as_str()?.to_string();
    Some(Code {
        system,
        code,
        version: json.get("version").and_then(|v| v.as_str()).map(String::from),
        display: json.get("display").and_then(|v| v.as_str()).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigates_choice_typed_value_by_concrete_suffix() {
        let obs = json!({ "resourceType": "Observation", "valueQuantity": { "value": 5 } });
        let result = navigate_property(&obs, "value");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["value"], 5);
    }

    #[test]
    fn extension_filters_by_url() {
        let res = json!({
            "extension": [
                { "url": "http://a", "valueString": "x" },
                { "url": "http://b", "valueString": "y" },
            ]
        });
        let found = extension(&res, "http://b");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["valueString"], "y");
    }

    #[test]
    fn of_type_filters_resources_by_resource_type() {
        let patient = Value::Resource(json!({ "resourceType": "Patient" }));
        let obs = Value::Resource(json!({ "resourceType": "Observation" }));
        let filtered = of_type(&[patient.clone(), obs], "Patient");
        assert_eq!(filtered, vec![patient]);
    }

    #[test]
    fn codings_of_reads_codeable_concept_shape() {
        let cc = json!({ "coding": [{ "system": "http://sys", "code": "123" }] });
        let codes = codings_of(&cc);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "123");
    }
}
