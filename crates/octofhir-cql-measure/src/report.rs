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

//! The `MeasureReport` tree: population counts plus `measureScore` per
//! group, with stratified sub-groups, and its FHIR-shaped JSON rendering.

use crate::population::PopulationKind;
use crate::scoring::PopulationCounts;
use rust_decimal::Decimal;
use serde_json::{json, Value as Json};

#[derive(Debug, Clone)]
pub struct PopulationReport {
    pub kind: PopulationKind,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct StratumReport {
    pub value: String,
    pub populations: Vec<PopulationReport>,
    pub measure_score: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct StratifierReport {
    pub name: String,
    pub strata: Vec<StratumReport>,
}

#[derive(Debug, Clone)]
pub struct GroupReport {
    pub populations: Vec<PopulationReport>,
    pub measure_score: Option<Decimal>,
    pub stratifiers: Vec<StratifierReport>,
}

#[derive(Debug, Clone)]
pub struct SubjectError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct MeasureReport {
    pub group: GroupReport,
    pub errors: Vec<SubjectError>,
}

fn population_json(populations: &[PopulationReport]) -> Json {
    populations
        .iter()
        .map(|p| json!({ "code": p.kind.report_code(), "count": p.count }))
        .collect::<Vec<_>>()
        .into()
}

fn score_json(score: Option<Decimal>) -> Json {
    match score {
        Some(s) => json!(s.to_string()),
        None => Json::Null,
    }
}

fn stratum_json(stratum: &StratumReport) -> Json {
    json!({
        "value": { "text": stratum.value },
        "population": population_json(&stratum.populations),
        "measureScore": { "value": score_json(stratum.measure_score) },
    })
}

impl MeasureReport {
    /// Renders the FHIR `MeasureReport` shape, ELM JSON's sibling artifact:
    /// a `resourceType` envelope, a `group` array
    /// with `population`/`measureScore`/`stratifier` entries.
    pub fn to_json(&self) -> Json {
        json!({
            "resourceType": "MeasureReport",
            "status": "complete",
            "type": "summary",
            "group": [{
                "population": population_json(&self.group.populations),
                "measureScore": { "value": score_json(self.group.measure_score) },
                "stratifier": self.group.stratifiers.iter().map(|s| json!({
                    "code": [{ "text": s.name }],
                    "stratum": s.strata.iter().map(stratum_json).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            }],
            "extension": self.errors.iter().map(|e| json!({
                "url": "subject-evaluation-error",
                "valueString": format!("subject {}: {}", e.index, e.message),
            })).collect::<Vec<_>>(),
        })
    }
}

/// Tallies a cohort slice's populations into the counts the scoring
/// formulas need.
pub fn tally(memberships: impl Iterator<Item = (PopulationKind, bool)>) -> PopulationCounts {
    let mut counts = PopulationCounts::default();
    for (kind, is_member) in memberships {
        if !is_member {
            continue;
        }
        match kind {
            PopulationKind::InitialPopulation => counts.initial_population += 1,
            PopulationKind::Denominator => counts.denominator += 1,
            PopulationKind::DenominatorExclusion => counts.denominator_exclusion += 1,
            PopulationKind::DenominatorException => counts.denominator_exception += 1,
            PopulationKind::Numerator => counts.numerator += 1,
            PopulationKind::NumeratorExclusion => counts.numerator_exclusion += 1,
            PopulationKind::MeasurePopulation => counts.measure_population += 1,
            PopulationKind::MeasureObservation => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_only_true_memberships() {
        let memberships = vec![(PopulationKind::InitialPopulation, true), (PopulationKind::InitialPopulation, false), (PopulationKind::Denominator, true)];
        let counts = tally(memberships.into_iter());
        assert_eq!(counts.initial_population, 1);
        assert_eq!(counts.denominator, 1);
    }

    #[test]
    fn report_json_carries_a_null_score_as_json_null() {
        let report = MeasureReport {
            group: GroupReport { populations: vec![], measure_score: None, stratifiers: vec![] },
            errors: vec![],
        };
        let json = report.to_json();
        assert_eq!(json["group"][0]["measureScore"]["value"], Json::Null);
    }
}
