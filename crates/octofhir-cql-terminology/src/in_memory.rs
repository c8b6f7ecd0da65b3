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

//! A value set index built once from ValueSet JSON resources, held
//! entirely in memory. Ingests either `compose.include.concept` (an
//! authored, unexpanded value set) or `expansion.contains` (a pre-expanded
//! one) — whichever the resource carries.

use crate::error::{TerminologyError, TerminologyResult};
use crate::service::{SubsumptionRelation, TerminologyService, ValidateCodeResult};
use octofhir_cql_core::Code;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct InMemoryTerminologyService {
    value_sets: FxHashMap<String, FxHashSet<(String, String)>>,
    displays: FxHashMap<(String, String), String>,
    /// `system -> (child_code -> parent_code)`, populated only when a
    /// ValueSet's `CodeSystem` companion resource declares a hierarchy
    /// (`concept[*].concept[*]` nesting); `subsumes` answers
    /// `NotSubsumed` for any system absent here.
    hierarchy: FxHashMap<String, FxHashMap<String, String>>,
}

impl InMemoryTerminologyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one ValueSet resource. `url` is read from the resource's own
    /// `url` field when present, otherwise falls back to the caller-supplied
    /// `fallback_url` (useful for bundles that omit canonical URLs).
    pub fn ingest_value_set(&mut self, resource: &serde_json::Value, fallback_url: Option<&str>) -> TerminologyResult<()> {
        let url = resource
            .get("url")
            .and_then(|u| u.as_str())
            .or(fallback_url)
            .ok_or_else(|| TerminologyError::MalformedValueSet {
                reason: "ValueSet has no url and no fallback was supplied".into(),
            })?
            .to_string();

        let mut set = FxHashSet::default();

        if let Some(contains) = resource
            .get("expansion")
            .and_then(|e| e.get("contains"))
            .and_then(|c| c.as_array())
        {
            for concept in contains {
                self.ingest_concept(concept, &mut set);
            }
        }

        if let Some(includes) = resource
            .get("compose")
            .and_then(|c| c.get("include"))
            .and_then(|i| i.as_array())
        {
            for include in includes {
                let system = include.get("system").and_then(|s| s.as_str()).unwrap_or("").to_string();
                if let Some(concepts) = include.get("concept").and_then(|c| c.as_array()) {
                    for concept in concepts {
                        let code = concept.get("code").and_then(|c| c.as_str());
                        if let Some(code) = code {
                            set.insert((system.clone(), code.to_string()));
                            if let Some(display) = concept.get("display").and_then(|d| d.as_str()) {
                                self.displays.insert((system.clone(), code.to_string()), display.to_string());
                            }
                        }
                    }
                }
            }
        }

        self.value_sets.insert(url, set);
        Ok(())
    }

    fn ingest_concept(&mut self, concept: &serde_json::Value, set: &mut FxHashSet<(String, String)>) {
        if let (Some(system), Some(code)) = (
            concept.get("system").and_then(|s| s.as_str()),
            concept.get("code").and_then(|c| c.as_str()),
        ) {
            set.insert((system.to_string(), code.to_string()));
            if let Some(display) = concept.get("display").and_then(|d| d.as_str()) {
                self.displays.insert((system.to_string(), code.to_string()), display.to_string());
            }
        }
    }

    /// Record a `child subsumed-by parent` edge for `subsumes`/`subsumed-by`
    /// queries against `system`.
    pub fn declare_hierarchy(&mut self, system: impl Into<String>, child: impl Into<String>, parent: impl Into<String>) {
        self.hierarchy
            .entry(system.into())
            .or_default()
            .insert(child.into(), parent.into());
    }

    fn ancestors<'a>(&'a self, system: &str, code: &'a str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut current = code;
        let map = match self.hierarchy.get(system) {
            Some(m) => m,
            None => return chain,
        };
        while let Some(parent) = map.get(current) {
            chain.push(parent.as_str());
            current = parent;
        }
        chain
    }
}

impl TerminologyService for InMemoryTerminologyService {
    fn validate_code(&self, url: &str, system: &str, code: &str) -> TerminologyResult<ValidateCodeResult> {
        let set = self
            .value_sets
            .get(url)
            .ok_or_else(|| TerminologyError::UnknownValueSet { url: url.to_string() })?;
        let key = (system.to_string(), code.to_string());
        let result = set.contains(&key);
        let display = self.displays.get(&key).cloned();
        Ok(ValidateCodeResult { result, display })
    }

    fn member_of(&self, code: &Code, url: &str) -> TerminologyResult<bool> {
        let set = self
            .value_sets
            .get(url)
            .ok_or_else(|| TerminologyError::UnknownValueSet { url: url.to_string() })?;
        Ok(set.contains(&(code.system.clone(), code.code.clone())))
    }

    fn subsumes(&self, system: &str, code_a: &str, code_b: &str) -> TerminologyResult<SubsumptionRelation> {
        if code_a == code_b {
            return Ok(SubsumptionRelation::Equivalent);
        }
        if self.ancestors(system, code_b).contains(&code_a) {
            return Ok(SubsumptionRelation::Subsumes);
        }
        if self.ancestors(system, code_a).contains(&code_b) {
            return Ok(SubsumptionRelation::SubsumedBy);
        }
        Ok(SubsumptionRelation::NotSubsumed)
    }

    fn expand(&self, url: &str) -> TerminologyResult<Option<Vec<(String, String)>>> {
        Ok(self.value_sets.get(url).map(|set| set.iter().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingests_compose_include_concept() {
        let mut svc = InMemoryTerminologyService::new();
        let vs = json!({
            "url": "http://vs/diabetes",
            "compose": { "include": [{ "system": "http://snomed", "concept": [{ "code": "123", "display": "Diabetes" }] }] }
        });
        svc.ingest_value_set(&vs, None).unwrap();
        let result = svc.validate_code("http://vs/diabetes", "http://snomed", "123").unwrap();
        assert!(result.result);
        assert_eq!(result.display.as_deref(), Some("Diabetes"));
    }

    #[test]
    fn ingests_expansion_contains() {
        let mut svc = InMemoryTerminologyService::new();
        let vs = json!({
            "url": "http://vs/expanded",
            "expansion": { "contains": [{ "system": "http://sys", "code": "A" }] }
        });
        svc.ingest_value_set(&vs, None).unwrap();
        let code = Code::new("http://sys", "A");
        assert!(svc.member_of(&code, "http://vs/expanded").unwrap());
    }

    #[test]
    fn unknown_value_set_is_an_error() {
        let svc = InMemoryTerminologyService::new();
        assert!(svc.validate_code("http://missing", "sys", "code").is_err());
    }

    #[test]
    fn subsumes_respects_declared_hierarchy() {
        let mut svc = InMemoryTerminologyService::new();
        svc.declare_hierarchy("http://snomed", "child-code", "parent-code");
        assert_eq!(
            svc.subsumes("http://snomed", "parent-code", "child-code").unwrap(),
            SubsumptionRelation::Subsumes
        );
        assert_eq!(
            svc.subsumes("http://snomed", "child-code", "parent-code").unwrap(),
            SubsumptionRelation::SubsumedBy
        );
    }

    #[test]
    fn subsumes_defaults_to_not_subsumed_without_hierarchy() {
        let svc = InMemoryTerminologyService::new();
        assert_eq!(
            svc.subsumes("http://snomed", "a", "b").unwrap(),
            SubsumptionRelation::NotSubsumed
        );
    }
}
