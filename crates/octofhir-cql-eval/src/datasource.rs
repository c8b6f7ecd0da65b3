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

//! The retrieve contract: `retrieve(resource_type,
//! patient_id?, code_filter?, date_filter?) -> Sequence<Resource>` plus
//! `resolve_reference`. The code filter here is always a concrete list of
//! codes — when a `Retrieve` node names a value set instead, the
//! tree-walker expands it through the terminology service first, so this
//! trait never has to know a value set from a literal code list.

use crate::navigator;
use octofhir_cql_core::{Code, Interval, Value};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct CodeFilter<'a> {
    pub path: &'a str,
    pub codes: &'a [Code],
}

#[derive(Debug, Clone)]
pub struct DateFilter<'a> {
    pub path: &'a str,
    pub range: &'a Interval,
}

pub trait DataSource: Send + Sync {
    fn retrieve(
        &self,
        resource_type: &str,
        patient_id: Option<&str>,
        code_filter: Option<CodeFilter<'_>>,
        date_filter: Option<DateFilter<'_>>,
    ) -> Vec<serde_json::Value>;

    fn resolve_reference(&self, reference: &str) -> Option<Value>;
}

fn matches_code_filter(resource: &serde_json::Value, filter: &CodeFilter<'_>) -> bool {
    let candidates = navigator::navigate_property(resource, filter.path);
    candidates.iter().any(|candidate| {
        navigator::codings_of(candidate)
            .iter()
            .any(|coding| filter.codes.iter().any(|c| c.system == coding.system && c.code == coding.code))
    })
}

fn matches_date_filter(resource: &serde_json::Value, filter: &DateFilter<'_>) -> bool {
    let candidates = navigator::navigate_property(resource, filter.path);
    candidates.iter().any(|candidate| {
        let text = match candidate.as_str() {
            Some(s) => s,
            None => return false,
        };
        match crate::temporal_literal::parse_date_or_datetime(text) {
            Some(value) => filter.range.contains_point(&value).unwrap_or(false),
            None => false,
        }
    })
}

/// Indexed by `(resource_type, id)` and, secondarily, by `(resource_type,
/// patient_id)` — a `patient` or `subject` reference field read once at
/// ingestion time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    by_id: FxHashMap<(String, String), serde_json::Value>,
    by_patient: FxHashMap<(String, String), Vec<serde_json::Value>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource_type: impl Into<String>, resource: serde_json::Value) {
        let resource_type = resource_type.into();
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if let Some(patient_id) = patient_reference(&resource) {
            self.by_patient
                .entry((resource_type.clone(), patient_id))
                .or_default()
                .push(resource.clone());
        }

        self.by_id.insert((resource_type, id), resource);
    }
}

fn patient_reference(resource: &serde_json::Value) -> Option<String> {
    for field in ["subject", "patient"] {
        if let Some(reference) = resource.get(field).and_then(|r| r.get("reference")).and_then(|r| r.as_str()) {
            return Some(reference.trim_start_matches("Patient/").to_string());
        }
    }
    None
}

impl DataSource for InMemoryDataSource {
    fn retrieve(
        &self,
        resource_type: &str,
        patient_id: Option<&str>,
        code_filter: Option<CodeFilter<'_>>,
        date_filter: Option<DateFilter<'_>>,
    ) -> Vec<serde_json::Value> {
        let candidates: Vec<serde_json::Value> = match patient_id {
            Some(pid) => self
                .by_patient
                .get(&(resource_type.to_string(), pid.to_string()))
                .cloned()
                .unwrap_or_default(),
            None => self
                .by_id
                .iter()
                .filter(|((rt, _), _)| rt == resource_type)
                .map(|(_, v)| v.clone())
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|r| code_filter.as_ref().map(|f| matches_code_filter(r, f)).unwrap_or(true))
            .filter(|r| date_filter.as_ref().map(|f| matches_date_filter(r, f)).unwrap_or(true))
            .collect()
    }

    fn resolve_reference(&self, reference: &str) -> Option<Value> {
        let (resource_type, id) = reference.split_once('/')?;
        self.by_id
            .get(&(resource_type.to_string(), id.to_string()))
            .cloned()
            .map(Value::Resource)
    }
}

/// Wraps a FHIR `Bundle`; a linear scan over `entry[*].resource` is
/// acceptable since bundles this engine processes are small — there is
/// no secondary index to maintain.
#[derive(Debug, Clone)]
pub struct BundleDataSource {
    entries: Vec<serde_json::Value>,
}

impl BundleDataSource {
    pub fn new(bundle: &serde_json::Value) -> Self {
        let entries = bundle
            .get("entry")
            .and_then(|e| e.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("resource").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Self { entries }
    }
}

impl DataSource for BundleDataSource {
    fn retrieve(
        &self,
        resource_type: &str,
        patient_id: Option<&str>,
        code_filter: Option<CodeFilter<'_>>,
        date_filter: Option<DateFilter<'_>>,
    ) -> Vec<serde_json::Value> {
        self.entries
            .iter()
            .filter(|r| r.get("resourceType").and_then(|t| t.as_str()) == Some(resource_type))
            .filter(|r| {
                patient_id
                    .map(|pid| patient_reference(r).as_deref() == Some(pid))
                    .unwrap_or(true)
            })
            .filter(|r| code_filter.as_ref().map(|f| matches_code_filter(r, f)).unwrap_or(true))
            .filter(|r| date_filter.as_ref().map(|f| matches_date_filter(r, f)).unwrap_or(true))
            .cloned()
            .collect()
    }

    fn resolve_reference(&self, reference: &str) -> Option<Value> {
        let (resource_type, id) = reference.split_once('/')?;
        self.entries
            .iter()
            .find(|r| {
                r.get("resourceType").and_then(|t| t.as_str()) == Some(resource_type)
                    && r.get("id").and_then(|v| v.as_str()) == Some(id)
            })
            .cloned()
            .map(Value::Resource)
    }
}

/// A [`BundleDataSource`] variant where a single known patient id seeds
/// every `retrieve` call's patient filter, even when the caller doesn't
/// pass one explicitly — the shape a per-subject measure evaluation needs
/// against one cohort member at a time.
#[derive(Debug, Clone)]
pub struct PatientBundleDataSource {
    bundle: BundleDataSource,
    patient_id: String,
}

impl PatientBundleDataSource {
    pub fn new(bundle: &serde_json::Value, patient_id: impl Into<String>) -> Self {
        Self {
            bundle: BundleDataSource::new(bundle),
            patient_id: patient_id.into(),
        }
    }
}

impl DataSource for PatientBundleDataSource {
    fn retrieve(
        &self,
        resource_type: &str,
        patient_id: Option<&str>,
        code_filter: Option<CodeFilter<'_>>,
        date_filter: Option<DateFilter<'_>>,
    ) -> Vec<serde_json::Value> {
        let patient_id = patient_id.unwrap_or(&self.patient_id);
        if resource_type == "Patient" {
            return self.bundle.retrieve(resource_type, None, code_filter, date_filter);
        }
        self.bundle.retrieve(resource_type, Some(patient_id), code_filter, date_filter)
    }

    fn resolve_reference(&self, reference: &str) -> Option<Value> {
        self.bundle.resolve_reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_indexes_by_patient_reference() {
        let mut ds = InMemoryDataSource::new();
        ds.insert(
            "Condition",
            json!({ "id": "c1", "resourceType": "Condition", "subject": { "reference": "Patient/p1" } }),
        );
        let found = ds.retrieve("Condition", Some("p1"), None, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], "c1");
    }

    #[test]
    fn bundle_scans_entries_by_resource_type() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "p1" } },
                { "resource": { "resourceType": "Condition", "id": "c1", "subject": { "reference": "Patient/p1" } } },
            ]
        });
        let ds = BundleDataSource::new(&bundle);
        assert_eq!(ds.retrieve("Patient", None, None, None).len(), 1);
        assert_eq!(ds.retrieve("Condition", Some("p1"), None, None).len(), 1);
    }

    #[test]
    fn patient_bundle_seeds_patient_filter_automatically() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": { "resourceType": "Condition", "id": "c1", "subject": { "reference": "Patient/p1" } } },
                { "resource": { "resourceType": "Condition", "id": "c2", "subject": { "reference": "Patient/p2" } } },
            ]
        });
        let ds = PatientBundleDataSource::new(&bundle, "p1");
        let found = ds.retrieve("Condition", None, None, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], "c1");
    }

    #[test]
    fn resolve_reference_finds_matching_entry() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{ "resource": { "resourceType": "Patient", "id": "p1" } }]
        });
        let ds = BundleDataSource::new(&bundle);
        assert!(ds.resolve_reference("Patient/p1").is_some());
        assert!(ds.resolve_reference("Patient/missing").is_none());
    }
}
